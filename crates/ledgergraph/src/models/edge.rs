//! Knowledge-graph relationships.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    HasLoan,
    Owns,
    PartyTo,
    HasMetric,
    Contains,
    ReportsTo,
    IssuedBy,
    Guarantees,
    RelatedTo,
    LocatedIn,
    WorksFor,
    SubsidiaryOf,
    SuppliesTo,
    MentionedIn,
    Acquired,
    InvestedIn,
    PartnersWith,
    ProvidesServiceFor,
    ReceivesServiceFrom,
    Owes,
    HasRisk,
    RegulatedBy,
    FinancedBy,
    ReportsOn,
    References,
    AssociatedWith,
}

impl EdgeType {
    /// Canonical SCREAMING_SNAKE string, used as the relationship type in
    /// the graph store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasLoan => "HAS_LOAN",
            Self::Owns => "OWNS",
            Self::PartyTo => "PARTY_TO",
            Self::HasMetric => "HAS_METRIC",
            Self::Contains => "CONTAINS",
            Self::ReportsTo => "REPORTS_TO",
            Self::IssuedBy => "ISSUED_BY",
            Self::Guarantees => "GUARANTEES",
            Self::RelatedTo => "RELATED_TO",
            Self::LocatedIn => "LOCATED_IN",
            Self::WorksFor => "WORKS_FOR",
            Self::SubsidiaryOf => "SUBSIDIARY_OF",
            Self::SuppliesTo => "SUPPLIES_TO",
            Self::MentionedIn => "MENTIONED_IN",
            Self::Acquired => "ACQUIRED",
            Self::InvestedIn => "INVESTED_IN",
            Self::PartnersWith => "PARTNERS_WITH",
            Self::ProvidesServiceFor => "PROVIDES_SERVICE_FOR",
            Self::ReceivesServiceFrom => "RECEIVES_SERVICE_FROM",
            Self::Owes => "OWES",
            Self::HasRisk => "HAS_RISK",
            Self::RegulatedBy => "REGULATED_BY",
            Self::FinancedBy => "FINANCED_BY",
            Self::ReportsOn => "REPORTS_ON",
            Self::References => "REFERENCES",
            Self::AssociatedWith => "ASSOCIATED_WITH",
        }
    }

    /// Parse the canonical string form.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(Value::String(raw.to_string())).ok()
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed relationship between two entities of the same graph.
///
/// Direction is semantic: a reverse duplicate is a different edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    /// Source entity id.
    pub source: String,
    /// Target entity id.
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    pub graph_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(
        id: String,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: EdgeType,
        graph_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            target: target.into(),
            edge_type,
            properties: HashMap::new(),
            graph_id: graph_id.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Deduplication key: (source, target, type). Reverse duplicates do not
    /// collide.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, EdgeType) {
        (self.source.clone(), self.target.clone(), self.edge_type)
    }
}

/// Drop duplicate edges while preserving order of first occurrence.
#[must_use]
pub fn dedup_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut seen = std::collections::HashSet::new();
    edges
        .into_iter()
        .filter(|e| seen.insert(e.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_type_serializes_screaming_snake() {
        let v = serde_json::to_string(&EdgeType::ProvidesServiceFor).unwrap();
        assert_eq!(v, "\"PROVIDES_SERVICE_FOR\"");
        assert_eq!(EdgeType::parse("HAS_LOAN"), Some(EdgeType::HasLoan));
        assert_eq!(EdgeType::parse("NOT_A_TYPE"), None);
    }

    #[test]
    fn dedup_preserves_reverse_duplicates() {
        let a = Edge::new("edge_1".into(), "x", "y", EdgeType::RelatedTo, "g");
        let b = Edge::new("edge_2".into(), "x", "y", EdgeType::RelatedTo, "g");
        let c = Edge::new("edge_3".into(), "y", "x", EdgeType::RelatedTo, "g");
        let out = dedup_edges(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "edge_1");
        assert_eq!(out[1].id, "edge_3");
    }
}
