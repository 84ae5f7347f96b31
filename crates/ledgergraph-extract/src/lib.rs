//! Extraction orchestration for LedgerGraph.
//!
//! Talks to the remote document-extraction service (Parse and Extract
//! endpoints plus async parse jobs), routes single files between the sync
//! and job paths by size, fans ZIP archives out with bounded concurrency,
//! and synthesizes extraction schemas from parsed markdown.

mod client;
mod orchestrator;
mod schema;

pub use client::{AdeClient, ParseResponse};
pub use orchestrator::{ExtractionOrchestrator, OrchestratorOptions};
pub use schema::SchemaAnalyzer;
