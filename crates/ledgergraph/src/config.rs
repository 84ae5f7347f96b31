//! Environment-driven application configuration.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const MIB: u64 = 1024 * 1024;

fn env_string_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse_or_default<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparseable env value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

/// All recognised configuration options, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Application
    pub app_name: String,
    pub app_version: String,
    pub api_prefix: String,

    // Server
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,

    // Remote document extraction service
    pub ade_api_url: String,
    pub ade_api_key: String,
    /// Files larger than this go through the async parse-job path.
    pub ade_sync_max_bytes: u64,
    /// Upper bound on job-status poll iterations.
    pub extract_poll_max_iterations: u32,
    /// Adaptive schema synthesis for the Extract step.
    pub adaptive_schema: bool,

    // LLM provider
    pub aws_region: String,
    pub model_id: String,
    pub fallback_model_ids: Vec<String>,

    // Vector store
    pub weaviate_url: String,
    pub weaviate_api_key: Option<String>,
    pub enable_weaviate: bool,

    // Graph store
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub enable_neo4j: bool,

    // Storage
    pub upload_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub max_upload_size: u64,

    // Logging
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Config {
    /// Resolve the configuration from environment variables, applying
    /// defaults for everything except credentials.
    pub fn from_env() -> Self {
        Self {
            app_name: env_string_or_default("LEDGERGRAPH_APP_NAME", "LedgerGraph"),
            app_version: env_string_or_default(
                "LEDGERGRAPH_APP_VERSION",
                env!("CARGO_PKG_VERSION"),
            ),
            api_prefix: env_string_or_default("LEDGERGRAPH_API_PREFIX", "/api/v1"),
            host: env_string_or_default("LEDGERGRAPH_HOST", "0.0.0.0"),
            port: env_parse_or_default("LEDGERGRAPH_PORT", 8000),
            cors_origins: env_list(
                "LEDGERGRAPH_CORS_ORIGINS",
                &["http://localhost:4200", "http://localhost:3000"],
            ),
            ade_api_url: env_string_or_default("ADE_API_URL", "https://api.va.landing.ai/v1"),
            ade_api_key: env_string_or_default("ADE_API_KEY", ""),
            ade_sync_max_bytes: env_parse_or_default("ADE_SYNC_MAX_BYTES", 15 * MIB),
            extract_poll_max_iterations: env_parse_or_default("LEDGERGRAPH_EXTRACT_POLL_MAX", 60),
            adaptive_schema: env_bool("LEDGERGRAPH_ADAPTIVE_SCHEMA", true),
            aws_region: env_string_or_default("AWS_REGION", "us-east-1"),
            model_id: env_string_or_default(
                "BEDROCK_MODEL_ID",
                "anthropic.claude-3-5-sonnet-20241022-v2:0",
            ),
            fallback_model_ids: env_list("BEDROCK_FALLBACK_MODELS", &[]),
            weaviate_url: env_string_or_default("WEAVIATE_URL", "http://localhost:8080"),
            weaviate_api_key: env_opt_string("WEAVIATE_API_KEY"),
            enable_weaviate: env_bool("ENABLE_WEAVIATE", false),
            neo4j_uri: env_string_or_default("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: env_string_or_default("NEO4J_USER", "neo4j"),
            neo4j_password: env_string_or_default("NEO4J_PASSWORD", ""),
            enable_neo4j: env_bool("ENABLE_NEO4J", false),
            upload_dir: PathBuf::from(env_string_or_default("LEDGERGRAPH_UPLOAD_DIR", "./uploads")),
            cache_dir: PathBuf::from(env_string_or_default("LEDGERGRAPH_CACHE_DIR", "./cache")),
            max_upload_size: env_parse_or_default("MAX_UPLOAD_SIZE", 100 * MIB),
            log_level: env_string_or_default("LEDGERGRAPH_LOG_LEVEL", "info"),
            log_file: PathBuf::from(env_string_or_default(
                "LEDGERGRAPH_LOG_FILE",
                "logs/ledgergraph.log",
            )),
        }
    }

    /// Directory the state snapshot files live in.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.cache_dir.join("state")
    }

    /// Directory persisted extraction-job results live in.
    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.cache_dir.join("jobs")
    }

    /// Create the working directories. Startup fails when one cannot be
    /// created, so an unusable environment exits non-zero.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.upload_dir.as_path(),
            self.cache_dir.as_path(),
            self.state_dir().as_path(),
            self.jobs_dir().as_path(),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Configuration(format!("cannot create directory {}: {e}", dir.display()))
            })?;
        }
        if let Some(parent) = Path::new(&self.log_file).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Configuration(format!(
                        "cannot create log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let cfg = Config::from_env();
        assert_eq!(cfg.max_upload_size, 100 * MIB);
        assert_eq!(cfg.ade_sync_max_bytes, 15 * MIB);
        assert_eq!(cfg.extract_poll_max_iterations, 60);
        assert_eq!(cfg.api_prefix, "/api/v1");
        assert!(cfg.state_dir().ends_with("state"));
    }
}
