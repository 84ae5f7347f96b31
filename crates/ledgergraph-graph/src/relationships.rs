//! Relationship inference: chunked LLM detection plus heuristic
//! enrichment.

use std::collections::HashMap;
use std::sync::Arc;

use ledgergraph::ids;
use ledgergraph::models::{dedup_edges, Edge, EdgeType, Entity, EntityType};
use ledgergraph::Result;
use ledgergraph_bedrock::{jsonx, CompletionModel, CompletionRequest};
use serde_json::json;

/// Minimum confidence for an LLM-proposed relationship to survive. A
/// single global constant, not per edge type.
pub const MIN_RELATIONSHIP_CONFIDENCE: f64 = 0.6;

const CHUNK_SIZE: usize = 20;

/// Property names whose shared values indicate a grouping relationship.
const GROUPING_PROPERTIES: &[&str] = &[
    "county",
    "state",
    "country",
    "region",
    "industry",
    "sector",
    "parent_company",
    "lender",
    "guarantor",
    "creditor",
    "party",
    "vendor",
    "supplier",
];

const SYSTEM_PROMPT: &str = r#"You are a knowledge graph expert. Analyze entities and identify ALL meaningful relationships between them.

Your goal: Find EVERY relationship where entities are connected through:
1. **Shared Properties**: Entities with same property values (e.g., same county, same industry)
2. **Hierarchical Relationships**: Parent-child, part-of, located-in (city -> county -> state)
3. **Functional Relationships**: One entity serves/supplies/reports to another
4. **Organizational Relationships**: Ownership, subsidiary, partnership
5. **Financial Relationships**: Has loan, issued by, owes to

Available relationship types:
- LOCATED_IN: Entity is in a location (city -> county -> state -> country)
- HAS_METRIC: Entity has associated metrics/measurements
- RELATED_TO: General semantic relationship (use for any meaningful connection)
- ISSUED_BY: Document/loan/debt issued by an entity
- HAS_LOAN: Entity has a loan
- OWNS: Owns a subsidiary/asset
- WORKS_FOR: Employment relationship
- SUBSIDIARY_OF: Is a subsidiary of
- REPORTS_TO: Hierarchical reporting
- SUPPLIES_TO: Vendor/supplier relationship
- MENTIONED_IN: Referenced in document/clause

IMPORTANT INSTRUCTIONS:
1. Look at entity NAMES and TYPES for obvious relationships
2. Compare all PROPERTIES - if entities share values, they're related
3. Infer hierarchical relationships from entity types (city LOCATED_IN county)
4. Create RELATED_TO for any meaningful connection not covered by specific types
5. Include ALL relationships - be comprehensive, not conservative
6. Minimum confidence: 0.6 (be inclusive, not restrictive)

Respond with JSON array:
[
  {
    "source_id": "entity_123",
    "target_id": "entity_456",
    "edge_type": "LOCATED_IN",
    "confidence": 0.95,
    "reasoning": "City of Akron is located in Summit County based on county property"
  }
]"#;

/// Canonicalize an LLM edge-type string, degrading unknown kinds to
/// RELATED_TO.
#[must_use]
pub fn normalize_edge_type(raw: &str) -> EdgeType {
    let key = raw.trim().to_uppercase().replace(['-', ' '], "_");
    if let Some(edge_type) = EdgeType::parse(&key) {
        return edge_type;
    }
    let mapped = match key.as_str() {
        "OWNER_OF" | "PARENT_OF" | "PARENT_COMPANY" => Some(EdgeType::Owns),
        "OWNED_BY" | "CHILD_OF" | "SUBSIDIARY" => Some(EdgeType::SubsidiaryOf),
        "PARTNER_OF" | "PARTNERSHIP_WITH" => Some(EdgeType::PartnersWith),
        "PROVIDES_SERVICES_TO" | "PROVIDES_SERVICE_TO" | "PROVIDES_SERVICE" | "PROVIDES_TO" => {
            Some(EdgeType::ProvidesServiceFor)
        }
        "SUPPLIES" | "SUPPLIES_FOR" | "SUPPLIER_OF" => Some(EdgeType::SuppliesTo),
        "RECEIVES_SERVICE" | "RECEIVES_SERVICES_FROM" | "CUSTOMER_OF" | "CLIENT_OF" => {
            Some(EdgeType::ReceivesServiceFrom)
        }
        "INVESTED" | "INVESTED_INTO" | "INVESTOR_IN" => Some(EdgeType::InvestedIn),
        "ACQUIRED_BY" | "ACQUIRES" => Some(EdgeType::Acquired),
        "GUARANTEED_BY" | "GUARANTEE_OF" | "GUARANTOR" => Some(EdgeType::Guarantees),
        "LOANED_BY" | "FINANCED" | "BORROWS_FROM" => Some(EdgeType::FinancedBy),
        "OWES_TO" | "OWES_TOWARDS" | "DEBT_TO" => Some(EdgeType::Owes),
        "ISSUED_TO" => Some(EdgeType::IssuedBy),
        "REGULATED" => Some(EdgeType::RegulatedBy),
        "REPORTS_ABOUT" | "DOCUMENTS" => Some(EdgeType::ReportsOn),
        "REFERENCED_IN" => Some(EdgeType::MentionedIn),
        "MENTIONS" | "MENTIONED_BY" => Some(EdgeType::References),
        "ASSOCIATED_TO" => Some(EdgeType::AssociatedWith),
        "CONNECTED_TO" | "RELATES_TO" | "LINKED_TO" => Some(EdgeType::RelatedTo),
        _ => None,
    };
    mapped.unwrap_or_else(|| {
        if !key.is_empty() {
            tracing::warn!(edge_type = %raw, "unknown edge type, defaulting to RELATED_TO");
        }
        EdgeType::RelatedTo
    })
}

/// Discovers semantic relationships between entities.
pub struct RelationshipDetector {
    model: Arc<dyn CompletionModel>,
}

impl RelationshipDetector {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Chunked LLM detection: one call per 20 entities, run sequentially
    /// to stay inside provider rate limits. Zero entities short-circuits
    /// without any LLM call.
    pub async fn detect_relationships_chunked(
        &self,
        entities: &[Entity],
        graph_id: &str,
    ) -> Result<Vec<Edge>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let chunks: Vec<&[Entity]> = entities.chunks(CHUNK_SIZE).collect();
        tracing::info!(
            chunks = chunks.len(),
            entities = entities.len(),
            "detecting relationships"
        );

        let mut all_edges = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            match self.detect_in_chunk(chunk, graph_id).await {
                Ok(edges) => {
                    tracing::info!(chunk = index + 1, found = edges.len(), "chunk processed");
                    all_edges.extend(edges);
                }
                Err(err) => {
                    tracing::warn!(chunk = index + 1, error = %err, "chunk failed, continuing");
                }
            }
        }
        Ok(dedup_edges(all_edges))
    }

    async fn detect_in_chunk(&self, chunk: &[Entity], graph_id: &str) -> Result<Vec<Edge>> {
        let descriptions: Vec<_> = chunk
            .iter()
            .map(|entity| {
                json!({
                    "id": entity.id,
                    "name": entity.name,
                    "type": entity.entity_type.as_str(),
                    "properties": entity.properties,
                })
            })
            .collect();
        let user_prompt = format!(
            "Analyze these entities and identify relationships between them:\n\n{}\n\nProvide relationships in JSON format.",
            serde_json::to_string_pretty(&descriptions)?
        );

        let response = self
            .model
            .complete(
                CompletionRequest::single_turn(SYSTEM_PROMPT, user_prompt)
                    .with_max_tokens(2048)
                    .with_temperature(0.2),
            )
            .await?;
        let text = response.text();

        let Some(candidates) = jsonx::extract_json_array(&text) else {
            tracing::warn!("unparseable relationship response, skipping chunk");
            return Ok(Vec::new());
        };

        let known_ids: std::collections::HashSet<&str> =
            chunk.iter().map(|e| e.id.as_str()).collect();
        let mut edges = Vec::new();
        for candidate in candidates {
            let confidence = candidate["confidence"].as_f64().unwrap_or(0.8);
            if confidence < MIN_RELATIONSHIP_CONFIDENCE {
                continue;
            }
            let (Some(source), Some(target)) = (
                candidate["source_id"].as_str(),
                candidate["target_id"].as_str(),
            ) else {
                continue;
            };
            if !known_ids.contains(source) || !known_ids.contains(target) {
                continue;
            }
            let raw_type = candidate["edge_type"].as_str().unwrap_or("RELATED_TO");
            let mut edge = Edge::new(
                ids::edge_id(),
                source,
                target,
                normalize_edge_type(raw_type),
                graph_id,
            );
            edge.properties.insert("confidence".into(), json!(confidence));
            edge.properties.insert(
                "reasoning".into(),
                json!(candidate["reasoning"].as_str().unwrap_or("")),
            );
            edge.properties.insert("detected_by".into(), json!("llm"));
            edge.properties.insert("raw_edge_type".into(), json!(raw_type));
            edges.push(edge);
        }
        Ok(edges)
    }

    /// Supplement LLM findings with rule-based edges, then deduplicate.
    /// `existing_edges` (e.g. narrative-extracted relationships) suppress
    /// equivalent heuristic proposals but are not returned.
    #[must_use]
    pub fn enhance_with_heuristics(
        &self,
        llm_edges: Vec<Edge>,
        entities: &[Entity],
        graph_id: &str,
        existing_edges: &[Edge],
    ) -> Vec<Edge> {
        let mut heuristic_edges = Vec::new();

        // Link every metric to the first company unless the LLM already did.
        if let Some(main_company) = entities.iter().find(|e| e.entity_type == EntityType::Company)
        {
            for entity in entities {
                if entity.entity_type != EntityType::Metric {
                    continue;
                }
                let already = llm_edges.iter().any(|e| {
                    e.source == main_company.id
                        && e.target == entity.id
                        && e.edge_type == EdgeType::HasMetric
                });
                if !already {
                    let mut edge = Edge::new(
                        ids::edge_id(),
                        main_company.id.clone(),
                        entity.id.clone(),
                        EdgeType::HasMetric,
                        graph_id,
                    );
                    edge.properties.insert("detected_by".into(), json!("heuristic"));
                    heuristic_edges.push(edge);
                }
            }
        }

        let property_edges = self.shared_property_edges(
            entities,
            &[&llm_edges[..], &heuristic_edges[..], existing_edges],
            graph_id,
        );
        if !property_edges.is_empty() {
            tracing::info!(count = property_edges.len(), "added property-based relationships");
        }
        heuristic_edges.extend(property_edges);
        tracing::info!(count = heuristic_edges.len(), "added heuristic edges");

        let mut all = llm_edges;
        all.extend(heuristic_edges);
        dedup_edges(all)
    }

    /// Propose an edge between every unordered pair of entities sharing a
    /// grouping property value, unless an equivalent edge already exists in
    /// either direction.
    fn shared_property_edges(
        &self,
        entities: &[Entity],
        existing: &[&[Edge]],
        graph_id: &str,
    ) -> Vec<Edge> {
        let mut new_edges: Vec<Edge> = Vec::new();

        let edge_exists = |source: &str, target: &str, new_edges: &[Edge]| {
            existing
                .iter()
                .flat_map(|edges| edges.iter())
                .chain(new_edges.iter())
                .any(|e| {
                    (e.source == source && e.target == target)
                        || (e.source == target && e.target == source)
                })
        };

        for property in GROUPING_PROPERTIES {
            let mut groups: HashMap<String, Vec<&Entity>> = HashMap::new();
            for entity in entities {
                let Some(value) = entity.string_property(property) else {
                    continue;
                };
                let lowered = value.to_lowercase();
                if matches!(lowered.as_str(), "null" | "none" | "0" | "n/a") {
                    continue;
                }
                groups.entry(value).or_default().push(entity);
            }

            for (value, members) in groups {
                if members.len() < 2 {
                    continue;
                }
                let edge_type = if *property == "county" {
                    EdgeType::LocatedIn
                } else {
                    EdgeType::RelatedTo
                };
                for (i, source) in members.iter().enumerate() {
                    for target in &members[i + 1..] {
                        if edge_exists(&source.id, &target.id, &new_edges) {
                            continue;
                        }
                        let mut edge = Edge::new(
                            ids::edge_id(),
                            source.id.clone(),
                            target.id.clone(),
                            edge_type,
                            graph_id,
                        );
                        edge.properties.insert("detected_by".into(), json!("heuristic"));
                        edge.properties
                            .insert("relationship".into(), json!(format!("shared_{property}")));
                        edge.properties.insert((*property).into(), json!(value.clone()));
                        edge.properties.insert("confidence".into(), json!(0.9));
                        edge.properties.insert(
                            "reasoning".into(),
                            json!(format!("Both entities share {property}: {value}")),
                        );
                        new_edges.push(edge);
                    }
                }
            }
        }
        new_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubModel;

    fn entity(id: &str, entity_type: EntityType, name: &str) -> Entity {
        Entity::new(id.into(), entity_type, name, "doc_1", "graph_1")
    }

    fn located(id: &str, name: &str, county: &str) -> Entity {
        let mut e = entity(id, EntityType::Location, name);
        e.properties.insert("county".into(), json!(county));
        e
    }

    #[tokio::test]
    async fn zero_entities_short_circuits_without_llm() {
        let model = Arc::new(StubModel::failing());
        let detector = RelationshipDetector::new(model.clone());
        let edges = detector
            .detect_relationships_chunked(&[], "graph_1")
            .await
            .unwrap();
        assert!(edges.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn low_confidence_and_unknown_ids_are_dropped() {
        let response = json!([
            {"source_id": "ent_a", "target_id": "ent_b", "edge_type": "OWNS", "confidence": 0.9},
            {"source_id": "ent_a", "target_id": "ent_b", "edge_type": "RELATED_TO", "confidence": 0.4},
            {"source_id": "ent_a", "target_id": "ent_ghost", "edge_type": "OWNS", "confidence": 0.95},
        ])
        .to_string();
        let detector = RelationshipDetector::new(Arc::new(StubModel::with_responses(vec![response])));
        let entities = vec![
            entity("ent_a", EntityType::Company, "Acme"),
            entity("ent_b", EntityType::Subsidiary, "Acme West"),
        ];
        let edges = detector
            .detect_relationships_chunked(&entities, "graph_1")
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::Owns);
        assert_eq!(edges[0].properties["detected_by"], "llm");
    }

    #[tokio::test]
    async fn alias_canonicalization_and_related_to_degradation() {
        assert_eq!(normalize_edge_type("OWNER_OF"), EdgeType::Owns);
        assert_eq!(normalize_edge_type("partner_of"), EdgeType::PartnersWith);
        assert_eq!(normalize_edge_type("provides services to"), EdgeType::ProvidesServiceFor);
        assert_eq!(normalize_edge_type("HAS_LOAN"), EdgeType::HasLoan);
        assert_eq!(normalize_edge_type("SOMETHING_ELSE"), EdgeType::RelatedTo);
        assert_eq!(normalize_edge_type(""), EdgeType::RelatedTo);
    }

    #[test]
    fn shared_county_produces_located_in_edges() {
        let detector = RelationshipDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![
            located("ent_akron", "Akron", "Summit"),
            located("ent_hudson", "Hudson", "Summit"),
            located("ent_canton", "Canton", "Stark"),
        ];
        let edges = detector.enhance_with_heuristics(Vec::new(), &entities, "graph_1", &[]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::LocatedIn);
        assert_eq!(edges[0].properties["relationship"], "shared_county");
    }

    #[test]
    fn existing_edges_suppress_heuristic_duplicates() {
        let detector = RelationshipDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![
            located("ent_akron", "Akron", "Summit"),
            located("ent_hudson", "Hudson", "Summit"),
        ];
        let existing = vec![Edge::new(
            "edge_prior".into(),
            "ent_hudson",
            "ent_akron",
            EdgeType::RelatedTo,
            "graph_1",
        )];
        let edges = detector.enhance_with_heuristics(Vec::new(), &entities, "graph_1", &existing);
        assert!(edges.is_empty());
    }

    #[test]
    fn metrics_link_to_first_company() {
        let detector = RelationshipDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![
            entity("ent_co", EntityType::Company, "Acme"),
            entity("ent_rev", EntityType::Metric, "revenue"),
            entity("ent_ebit", EntityType::Metric, "ebitda"),
        ];
        let edges = detector.enhance_with_heuristics(Vec::new(), &entities, "graph_1", &[]);
        let metric_edges: Vec<_> = edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::HasMetric)
            .collect();
        assert_eq!(metric_edges.len(), 2);
        assert!(metric_edges.iter().all(|e| e.source == "ent_co"));
    }
}
