//! Per-document knowledge-graph instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Edge, Entity};

/// One knowledge graph: exactly the entities and edges derived from a
/// document's most recent normalization.
///
/// Entities and edges live in parallel vectors; edges refer to entities by
/// string id. Lookup maps are built on demand, so the graph itself carries
/// no back-pointers and cycles are unproblematic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    pub document_id: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Graph {
    pub fn new(id: String, document_id: impl Into<String>) -> Self {
        Self {
            id,
            document_id: document_id.into(),
            entities: Vec::new(),
            edges: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Entity lookup keyed by id.
    #[must_use]
    pub fn entity_index(&self) -> HashMap<&str, &Entity> {
        self.entities.iter().map(|e| (e.id.as_str(), e)).collect()
    }

    /// Whether every edge references entities present in this graph.
    #[must_use]
    pub fn edges_are_closed(&self) -> bool {
        let index = self.entity_index();
        self.edges
            .iter()
            .all(|e| index.contains_key(e.source.as_str()) && index.contains_key(e.target.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeType, EntityType};

    #[test]
    fn edge_closure_check() {
        let mut g = Graph::new("graph_1".into(), "doc_1");
        g.entities.push(Entity::new(
            "ent_a".into(),
            EntityType::Company,
            "Acme",
            "doc_1",
            "graph_1",
        ));
        g.entities.push(Entity::new(
            "ent_b".into(),
            EntityType::Loan,
            "Term Loan",
            "doc_1",
            "graph_1",
        ));
        g.edges.push(Edge::new(
            "edge_1".into(),
            "ent_a",
            "ent_b",
            EdgeType::HasLoan,
            "graph_1",
        ));
        assert!(g.edges_are_closed());

        g.edges.push(Edge::new(
            "edge_2".into(),
            "ent_a",
            "ent_missing",
            EdgeType::RelatedTo,
            "graph_1",
        ));
        assert!(!g.edges_are_closed());
    }
}
