//! LLM-mode narrative extraction.
//!
//! Chunks prose at paragraph boundaries and asks the model for entities
//! and relationships per chunk, deduplicating entities by name across
//! chunks. Returns `(entities, edges)` directly; edges reference names
//! already accumulated in the entity map.

use std::collections::HashMap;
use std::sync::Arc;

use ledgergraph::ids;
use ledgergraph::models::{Edge, EdgeType, Entity, EntityType};
use ledgergraph::text::{chunk_paragraphs, strip_html};
use ledgergraph::Result;
use ledgergraph_bedrock::{jsonx, CompletionModel, CompletionRequest};
use serde_json::json;

const CHUNK_SIZE_CHARS: usize = 1000;
const MIN_CHUNK_CHARS: usize = 50;

const SYSTEM_PROMPT: &str = r#"You are a financial document analysis expert. Extract entities and relationships from text.

Extract:
1. **Entities**: Organizations, people, locations, monetary amounts, dates, risks/topics
2. **Relationships**: How entities are connected in the text

Respond with JSON:
{
  "entities": [
    {
      "name": "Bitcoin",
      "type": "ORGANIZATION|PERSON|LOCATION|MONEY|DATE|RISK",
      "properties": {"industry": "cryptocurrency", "description": "..."}
    }
  ],
  "relationships": [
    {
      "source_name": "DocuSign",
      "target_name": "USDC",
      "relationship_type": "PARTNERS_WITH|DEPENDS_ON|ISSUES|PROVIDES|HAS_RISK|RELATED_TO",
      "reasoning": "DocuSign partners with Circle for USDC services"
    }
  ]
}

IMPORTANT:
- Extract ALL entities mentioned (companies, people, places, amounts, dates, concepts)
- Capture ALL relationships explicitly stated in the text
- Use entity names exactly as they appear
- Provide clear reasoning for each relationship"#;

fn map_llm_entity_type(raw: &str) -> EntityType {
    match raw.to_uppercase().as_str() {
        "ORGANIZATION" | "COMPANY" => EntityType::Company,
        "PERSON" => EntityType::Person,
        "LOCATION" => EntityType::Location,
        "MONEY" | "DATE" => EntityType::Metric,
        _ => EntityType::Clause,
    }
}

/// Narrative relationship kinds map onto the closed edge-type set; the
/// vaguer kinds all degrade to RELATED_TO.
fn map_relationship_type(raw: &str) -> EdgeType {
    match raw.to_uppercase().as_str() {
        "MENTIONED_IN" => EdgeType::MentionedIn,
        "ISSUES" => EdgeType::IssuedBy,
        "PROVIDES" => EdgeType::SuppliesTo,
        "PARTNERS_WITH" => EdgeType::PartnersWith,
        _ => EdgeType::RelatedTo,
    }
}

fn display_label(raw: &str) -> String {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return "Topic".to_string();
    }
    if cleaned.chars().all(|c| !c.is_ascii_lowercase()) {
        let mut label = cleaned.to_lowercase().replace('_', " ");
        if let Some(first) = label.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        label
    } else {
        cleaned.to_string()
    }
}

/// Chunked LLM extraction of entities and relationships from prose.
pub struct NarrativeLlmParser {
    model: Arc<dyn CompletionModel>,
}

impl NarrativeLlmParser {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn extract(
        &self,
        markdown: &str,
        document_id: &str,
        graph_id: &str,
    ) -> Result<(Vec<Entity>, Vec<Edge>)> {
        let text = strip_html(markdown);
        let chunks = chunk_paragraphs(&text, CHUNK_SIZE_CHARS);
        tracing::info!(chunks = chunks.len(), "narrative LLM extraction starting");

        let mut entities: Vec<Entity> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();
        // Entity ids accumulate by name so cross-chunk relationships can
        // reference entities found earlier.
        let mut by_name: HashMap<String, String> = HashMap::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.trim().len() < MIN_CHUNK_CHARS {
                continue;
            }
            match self
                .extract_from_chunk(chunk, document_id, graph_id, &mut by_name)
                .await
            {
                Ok((chunk_entities, chunk_edges)) => {
                    tracing::debug!(
                        chunk = index + 1,
                        entities = chunk_entities.len(),
                        relationships = chunk_edges.len(),
                        "chunk extracted"
                    );
                    entities.extend(chunk_entities);
                    edges.extend(chunk_edges);
                }
                Err(err) => {
                    tracing::warn!(chunk = index + 1, error = %err, "chunk extraction failed");
                }
            }
        }

        tracing::info!(
            entities = entities.len(),
            relationships = edges.len(),
            "narrative LLM extraction finished"
        );
        Ok((entities, edges))
    }

    async fn extract_from_chunk(
        &self,
        chunk: &str,
        document_id: &str,
        graph_id: &str,
        by_name: &mut HashMap<String, String>,
    ) -> Result<(Vec<Entity>, Vec<Edge>)> {
        let excerpt: String = chunk.chars().take(1500).collect();
        let user_prompt =
            format!("Analyze this text and extract entities + relationships:\n\n{excerpt}\n\nProvide JSON response.");
        let response = self
            .model
            .complete(
                CompletionRequest::single_turn(SYSTEM_PROMPT, user_prompt)
                    .with_max_tokens(2048)
                    .with_temperature(0.3),
            )
            .await?;

        let Some(payload) = jsonx::extract_json_object(&response.text()) else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut entities = Vec::new();
        if let Some(raw_entities) = payload.get("entities").and_then(|v| v.as_array()) {
            for raw in raw_entities {
                let Some(name) = raw["name"].as_str().map(str::trim).filter(|n| !n.is_empty())
                else {
                    continue;
                };
                if by_name.contains_key(name) {
                    continue;
                }
                let raw_type = raw["type"].as_str().unwrap_or("RISK");
                let mut entity = Entity::new(
                    ids::entity_id(),
                    map_llm_entity_type(raw_type),
                    name,
                    document_id,
                    graph_id,
                );
                entity.display_type = Some(display_label(raw_type));
                entity.original_type = Some(raw_type.to_string());
                if let Some(props) = raw["properties"].as_object() {
                    for (key, value) in props {
                        entity.properties.insert(key.clone(), value.clone());
                    }
                }
                entity
                    .properties
                    .insert("extracted_from".into(), json!("narrative_llm"));
                by_name.insert(name.to_string(), entity.id.clone());
                entities.push(entity);
            }
        }

        let mut edges = Vec::new();
        if let Some(raw_edges) = payload.get("relationships").and_then(|v| v.as_array()) {
            for raw in raw_edges {
                let (Some(source_name), Some(target_name)) = (
                    raw["source_name"].as_str().map(str::trim),
                    raw["target_name"].as_str().map(str::trim),
                ) else {
                    continue;
                };
                let (Some(source_id), Some(target_id)) =
                    (by_name.get(source_name), by_name.get(target_name))
                else {
                    continue;
                };
                let mut edge = Edge::new(
                    ids::edge_id(),
                    source_id.clone(),
                    target_id.clone(),
                    map_relationship_type(raw["relationship_type"].as_str().unwrap_or("RELATED_TO")),
                    graph_id,
                );
                edge.properties.insert(
                    "reasoning".into(),
                    json!(raw["reasoning"].as_str().unwrap_or("")),
                );
                edge.properties
                    .insert("detected_by".into(), json!("narrative_llm"));
                edge.properties.insert("confidence".into(), json!(0.85));
                edges.push(edge);
            }
        }

        Ok((entities, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubModel;

    #[tokio::test]
    async fn entities_dedup_by_name_and_edges_resolve_names() {
        let chunk1 = json!({
            "entities": [
                {"name": "DocuSign", "type": "ORGANIZATION", "properties": {"industry": "software"}},
                {"name": "Circle", "type": "ORGANIZATION", "properties": {}}
            ],
            "relationships": [
                {"source_name": "DocuSign", "target_name": "Circle",
                 "relationship_type": "PARTNERS_WITH", "reasoning": "partnership"}
            ]
        })
        .to_string();
        let chunk2 = json!({
            "entities": [
                {"name": "DocuSign", "type": "ORGANIZATION", "properties": {}},
                {"name": "USDC", "type": "MONEY", "properties": {}}
            ],
            "relationships": [
                {"source_name": "Circle", "target_name": "USDC",
                 "relationship_type": "ISSUES", "reasoning": "Circle issues USDC"},
                {"source_name": "Circle", "target_name": "Unknown Co",
                 "relationship_type": "RELATED_TO", "reasoning": "dangling"}
            ]
        })
        .to_string();

        let parser = NarrativeLlmParser::new(Arc::new(StubModel::with_responses(vec![
            chunk1, chunk2,
        ])));
        let markdown = format!("{}\n\n{}", "a".repeat(900), "b".repeat(900));
        let (entities, edges) = parser.extract(&markdown, "doc_1", "graph_1").await.unwrap();

        // DocuSign appears once despite being reported in both chunks.
        assert_eq!(entities.len(), 3);
        assert_eq!(
            entities
                .iter()
                .filter(|e| e.name == "DocuSign")
                .count(),
            1
        );
        assert!(entities
            .iter()
            .any(|e| e.name == "USDC" && e.entity_type == EntityType::Metric));

        // Cross-chunk edge resolves Circle from the first chunk; the edge
        // to an unknown name is dropped.
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].edge_type, EdgeType::PartnersWith);
        assert_eq!(edges[1].edge_type, EdgeType::IssuedBy);
        assert!(edges
            .iter()
            .all(|e| e.properties["detected_by"] == "narrative_llm"));
    }

    #[tokio::test]
    async fn unparseable_chunk_degrades_to_empty() {
        let parser = NarrativeLlmParser::new(Arc::new(StubModel::with_responses(vec![
            "no json in this reply".to_string(),
        ])));
        let markdown = "c".repeat(400);
        let (entities, edges) = parser.extract(&markdown, "doc_1", "graph_1").await.unwrap();
        assert!(entities.is_empty());
        assert!(edges.is_empty());
    }
}
