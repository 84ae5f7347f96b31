//! Detected risks and their visualization subgraphs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::citation::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// The per-risk projection of entities and edges attached for
/// visualization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskSubgraph {
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub relationships: Vec<Value>,
    #[serde(default)]
    pub reasoning: String,
}

/// A risk detected against a graph, by rule or by the LLM anomaly pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Risk {
    pub id: String,
    /// Risk category label, e.g. "High Variable Rate".
    #[serde(rename = "type")]
    pub risk_type: String,
    pub severity: RiskSeverity,
    pub description: String,
    #[serde(default)]
    pub affected_entity_ids: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Risk score in [0, 1].
    pub score: f64,
    /// The threshold that triggered the risk.
    pub threshold: f64,
    /// The observed value compared against the threshold.
    pub actual_value: f64,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_data: Option<RiskSubgraph>,
    pub document_id: String,
    pub graph_id: String,
    #[serde(default = "Utc::now")]
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_leniently() {
        assert_eq!(RiskSeverity::parse("CRITICAL"), RiskSeverity::Critical);
        assert_eq!(RiskSeverity::parse("high"), RiskSeverity::High);
        assert_eq!(RiskSeverity::parse("whatever"), RiskSeverity::Medium);
    }

    #[test]
    fn severity_orders_low_to_critical() {
        assert!(RiskSeverity::Low < RiskSeverity::Critical);
        assert!(RiskSeverity::Medium < RiskSeverity::High);
    }
}
