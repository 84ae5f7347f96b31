//! Knowledge-graph construction and analysis.
//!
//! Turns extraction records into typed entities and edges (the cascade
//! normalizer), infers relationships (chunked LLM calls plus heuristic
//! enrichment), detects risks (rule table plus LLM anomaly pass) and
//! serves registered analytics metrics over the graph store.

pub mod analytics;
pub mod narrative_llm;
pub mod normalize;
pub mod relationships;
pub mod risk;

pub use analytics::AnalyticsEngine;
pub use narrative_llm::NarrativeLlmParser;
pub use normalize::{NormalizedGraph, Normalizer};
pub use relationships::RelationshipDetector;
pub use risk::RiskDetector;

#[cfg(test)]
pub(crate) mod test_support;
