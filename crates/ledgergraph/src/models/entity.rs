//! Knowledge-graph entities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::citation::Citation;

/// Closed set of entity kinds the graph distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Company,
    Subsidiary,
    Loan,
    Invoice,
    Metric,
    Clause,
    Instrument,
    Vendor,
    Person,
    Location,
}

impl EntityType {
    /// Canonical string form, matching the serialized representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Subsidiary => "Subsidiary",
            Self::Loan => "Loan",
            Self::Invoice => "Invoice",
            Self::Metric => "Metric",
            Self::Clause => "Clause",
            Self::Instrument => "Instrument",
            Self::Vendor => "Vendor",
            Self::Person => "Person",
            Self::Location => "Location",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a knowledge graph.
///
/// Properties are a flat mapping; nested structures produced by extraction
/// are flattened at normalization time. Every entity belongs to exactly one
/// graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub name: String,
    /// Free-form human label, e.g. "Risk" for a narrative risk clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
    /// The label the source produced before type mapping, e.g. "ORGANIZATION".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Vector embedding when one has been attached locally. The vector
    /// store usually vectorises server-side, so this stays empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub document_id: String,
    pub graph_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(
        id: String,
        entity_type: EntityType,
        name: impl Into<String>,
        document_id: impl Into<String>,
        graph_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            entity_type,
            name: name.into(),
            display_type: None,
            original_type: None,
            properties: HashMap::new(),
            citations: Vec::new(),
            embedding: None,
            document_id: document_id.into(),
            graph_id: graph_id.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    /// A property read as f64, accepting numeric strings with `$`/`,`
    /// decoration as extraction often produces.
    #[must_use]
    pub fn numeric_property(&self, key: &str) -> Option<f64> {
        crate::text::value_as_f64(self.properties.get(key)?)
    }

    /// A property read as a non-empty trimmed string.
    #[must_use]
    pub fn string_property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_type_round_trips_as_pascal_case() {
        let v = serde_json::to_string(&EntityType::Location).unwrap();
        assert_eq!(v, "\"Location\"");
        let back: EntityType = serde_json::from_str("\"Loan\"").unwrap();
        assert_eq!(back, EntityType::Loan);
    }

    #[test]
    fn numeric_property_accepts_decorated_strings() {
        let mut e = Entity::new(
            "ent_1".into(),
            EntityType::Loan,
            "Term Loan A",
            "doc_1",
            "graph_1",
        );
        e.properties.insert("principal".into(), json!("$1,250,000.50"));
        e.properties.insert("rate".into(), json!(0.09));
        assert_eq!(e.numeric_property("principal"), Some(1_250_000.50));
        assert_eq!(e.numeric_property("rate"), Some(0.09));
        assert_eq!(e.numeric_property("missing"), None);
    }
}
