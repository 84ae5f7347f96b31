//! Error types shared across the workspace.

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the pipeline.
///
/// Variants map onto the four failure categories the pipeline
/// distinguishes: validation (surfaced, never retried), transient external
/// failures (retried by the caller's policy), parse/schema degradation
/// (recovered locally) and store unavailability (degraded to empty results).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid caller input: bad media type, oversize upload, malformed request.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced document, graph, entity or session does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Connection-level failure talking to a remote service.
    #[error("network error: {0}")]
    Network(String),

    /// Remote service returned an error status.
    #[error("remote service error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Provider-side throttling (429-class). Drives model fallback.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Unusable configuration detected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Vector or graph store failure. Callers degrade rather than propagate.
    #[error("store error: {0}")]
    Store(String),

    /// Cooperative cancellation observed at a suspension point.
    #[error("operation cancelled")]
    Cancelled,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: msg.into(),
        }
    }

    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the remote-call retry loop should try again.
    ///
    /// Retryable conditions are connection errors, timeouts (both reported
    /// as [`Error::Network`]), throttling, and the 408/409/429/5xx status
    /// family. Validation and other 4xx failures propagate immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Throttled(_) => true,
            Self::Api { status, .. } => {
                matches!(status, 408 | 409 | 429) || *status >= 500
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::network("connection reset").is_retryable());
        assert!(Error::throttled("rate limit").is_retryable());
        assert!(Error::api(429, "too many requests").is_retryable());
        assert!(Error::api(409, "conflict").is_retryable());
        assert!(Error::api(503, "unavailable").is_retryable());
        assert!(!Error::api(400, "bad request").is_retryable());
        assert!(!Error::api(404, "missing").is_retryable());
        assert!(!Error::validation("bad mime").is_retryable());
        assert!(!Error::store("neo4j down").is_retryable());
    }
}
