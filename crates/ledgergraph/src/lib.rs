//! Core types and shared infrastructure for the LedgerGraph pipeline.
//!
//! This crate defines the knowledge-graph data model (documents, entities,
//! edges, risks, chat sessions, extraction jobs), the application
//! configuration, the process-wide state bundle with its JSON snapshots,
//! and small shared utilities (retry helper, progress tracking, markdown
//! text handling) used by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod progress;
pub mod retry;
pub mod state;
pub mod text;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
