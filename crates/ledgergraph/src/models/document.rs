//! Document record and its processing-status lattice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extraction::ExtractionRecord;

/// Processing status of a document.
///
/// Statuses form an ordered lattice; a document only ever advances, except
/// for the off-lattice `Failed` state, from which a retry restores the
/// prior stage's terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Uploading,
    Uploaded,
    Extracting,
    Extracted,
    Normalizing,
    Normalized,
    Indexing,
    Indexed,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Position in the lattice. `Failed` has no rank.
    #[must_use]
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Uploading => Some(1),
            Self::Uploaded => Some(2),
            Self::Extracting => Some(3),
            Self::Extracted => Some(4),
            Self::Normalizing => Some(5),
            Self::Normalized => Some(6),
            Self::Indexing => Some(7),
            Self::Indexed => Some(8),
            Self::Completed => Some(9),
            Self::Failed => None,
        }
    }

    /// Whether moving to `next` is a legal transition: monotone advancement
    /// on the lattice, any state may fail, and a failed document may be
    /// restored to a terminal stage for retry.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (None, Some(_)) => true,
            (Some(a), Some(b)) => b >= a,
        }
    }

    /// The terminal status of the stage preceding this one, used to restore
    /// a failed document before a retry.
    #[must_use]
    pub fn prior_terminal(self) -> Self {
        match self {
            Self::Extracting | Self::Extracted => Self::Uploaded,
            Self::Normalizing | Self::Normalized => Self::Extracted,
            Self::Indexing | Self::Indexed => Self::Normalized,
            Self::Completed => Self::Indexed,
            other => other,
        }
    }
}

/// An uploaded document and everything the pipeline has derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    pub status: DocumentStatus,

    // Processing results
    #[serde(default)]
    pub extraction_id: Option<String>,
    #[serde(default)]
    pub graph_id: Option<String>,
    #[serde(default)]
    pub entities_count: usize,
    #[serde(default)]
    pub edges_count: usize,

    /// Parsed markdown plus structured extraction, present once status is
    /// at least `Extracted`.
    #[serde(default)]
    pub extraction: Option<ExtractionRecord>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,

    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Document {
    pub fn new(
        id: String,
        filename: String,
        file_path: String,
        file_size: u64,
        mime_type: String,
    ) -> Self {
        Self {
            id,
            filename,
            file_path,
            file_size,
            mime_type,
            status: DocumentStatus::Uploaded,
            extraction_id: None,
            graph_id: None,
            entities_count: 0,
            edges_count: 0,
            extraction: None,
            total_pages: None,
            confidence: None,
            uploaded_at: Utc::now(),
            processed_at: None,
            error_message: None,
        }
    }

    /// Parsed markdown, if extraction has run.
    #[must_use]
    pub fn markdown(&self) -> Option<&str> {
        self.extraction.as_ref().map(|e| e.markdown.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lattice_is_monotone() {
        assert!(DocumentStatus::Uploaded.can_advance_to(DocumentStatus::Extracting));
        assert!(DocumentStatus::Extracting.can_advance_to(DocumentStatus::Failed));
        assert!(DocumentStatus::Failed.can_advance_to(DocumentStatus::Uploaded));
        assert!(!DocumentStatus::Indexed.can_advance_to(DocumentStatus::Uploaded));
        // Re-entering the same status is legal (idempotent stage re-runs).
        assert!(DocumentStatus::Extracted.can_advance_to(DocumentStatus::Extracted));
    }

    #[test]
    fn prior_terminal_restores_stage_boundaries() {
        assert_eq!(
            DocumentStatus::Extracting.prior_terminal(),
            DocumentStatus::Uploaded
        );
        assert_eq!(
            DocumentStatus::Normalizing.prior_terminal(),
            DocumentStatus::Extracted
        );
        assert_eq!(
            DocumentStatus::Indexing.prior_terminal(),
            DocumentStatus::Normalized
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let s = serde_json::to_string(&DocumentStatus::Extracting).unwrap();
        assert_eq!(s, "\"extracting\"");
    }
}
