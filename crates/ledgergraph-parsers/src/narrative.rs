//! Pattern-mode narrative extraction.
//!
//! The regex half of narrative handling: entity recognition for
//! organizations, monetary amounts, dates, people and locations, plus
//! risk/topic entities derived from paragraph leads. The LLM half lives
//! with the normalizer, which prefers it and falls back here.

use std::collections::HashSet;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::json;

const MAX_ENTITIES: usize = 200;
const MAX_RISKS: usize = 50;

static PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            "ORGANIZATION",
            vec![Regex::new(
                r"\b[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*\s+(?:Inc\.?|LLC|Ltd\.?|Corporation|Corp\.?|Company|Co\.)\b",
            )
            .expect("valid regex")],
        ),
        (
            "MONEY",
            vec![
                Regex::new(r"\$\s*\d+(?:,\d{3})*(?:\.\d{2})?(?:\s*(?:million|billion|trillion|M|B|T))?")
                    .expect("valid regex"),
                Regex::new(r"\d+(?:,\d{3})*(?:\.\d{2})?\s*(?:dollars|USD)").expect("valid regex"),
            ],
        ),
        (
            "DATE",
            vec![
                Regex::new(r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b")
                    .expect("valid regex"),
                Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").expect("valid regex"),
            ],
        ),
        (
            "PERSON",
            vec![Regex::new(r"\b(?:Mr\.?|Mrs\.?|Ms\.?|Dr\.?)\s+[A-Z][a-z]+\s+[A-Z][a-z]+\b")
                .expect("valid regex")],
        ),
        (
            "LOCATION",
            vec![Regex::new(
                r"\b(?:United States|USA|U\.S\.|California|New York|Texas|Ohio|London|Singapore)\b",
            )
            .expect("valid regex")],
        ),
    ]
});

static FIRST_SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.!?]{20,250})[.!?]").expect("valid regex"));

fn map_entity_type(raw: &str) -> EntityType {
    match raw {
        "ORGANIZATION" => EntityType::Company,
        "MONEY" | "DATE" => EntityType::Metric,
        "PERSON" => EntityType::Person,
        "LOCATION" => EntityType::Location,
        _ => EntityType::Clause,
    }
}

fn display_label(raw: &str) -> String {
    let mut label = raw.to_lowercase().replace('_', " ");
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    label
}

/// Extract entities from narrative prose with the fixed pattern library.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let mut entities = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    'outer: for (raw_type, regexes) in PATTERNS.iter() {
        for re in regexes {
            for found in re.find_iter(&text) {
                let name = found.as_str().trim().to_string();
                if name.len() < 3 || !seen.insert(name.clone()) {
                    continue;
                }
                let entity_type = map_entity_type(raw_type);
                let mut entity = Entity::new(
                    ids::entity_id(),
                    entity_type,
                    name,
                    document_id,
                    graph_id,
                );
                entity.display_type = Some(display_label(raw_type));
                entity.original_type = Some((*raw_type).to_string());
                entity
                    .properties
                    .insert("extracted_from".into(), json!("narrative_text"));
                entity
                    .properties
                    .insert("source_type".into(), json!(raw_type));
                entities.push(entity);
                if entities.len() >= MAX_ENTITIES {
                    break 'outer;
                }
            }
        }
    }

    let remaining = MAX_ENTITIES.saturating_sub(entities.len());
    entities.extend(extract_risk_entities(&text, document_id, graph_id).into_iter().take(remaining));

    tracing::info!(entities = entities.len(), "narrative pattern parser finished");
    entities
}

/// Derive risk/topic clause entities from the first sentence of each
/// substantial paragraph.
fn extract_risk_entities(text: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let mut risks = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for para in text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.len() > 50)
        .take(MAX_RISKS)
    {
        let lead = FIRST_SENTENCE_RE
            .captures(para)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| para.chars().take(200).collect::<String>().trim().to_string());
        if lead.len() < 20 || !seen.insert(lead.clone()) {
            continue;
        }

        let category = if para.to_lowercase().contains("risk") {
            "risk"
        } else {
            "narrative"
        };
        let mut entity = Entity::new(
            ids::entity_id(),
            EntityType::Clause,
            lead.chars().take(100).collect::<String>(),
            document_id,
            graph_id,
        );
        entity.display_type = Some("Risk".to_string());
        entity.original_type = Some("RISK".to_string());
        entity.properties.insert("description".into(), json!(lead));
        entity.properties.insert(
            "full_text".into(),
            json!(para.chars().take(500).collect::<String>()),
        );
        entity.properties.insert("category".into(), json!(category));
        entity
            .properties
            .insert("extracted_from".into(), json!("narrative_paragraph"));
        risks.push(entity);

        if risks.len() >= MAX_RISKS {
            break;
        }
    }
    risks
}

#[cfg(test)]
mod tests {
    use super::*;

    const NARRATIVE: &str = "Risk Factors\n\n\
        Vertex Holdings Inc. depends heavily on a single supplier relationship. \
        The company paid $12,500,000 to secure inventory through March 15, 2026.\n\n\
        Our operations in California face regulatory risk that could materially \
        affect results. Dr. Alice Moreno leads the compliance function.\n";

    #[test]
    fn recognises_named_entity_kinds() {
        let entities = extract_entities(NARRATIVE, "doc_1", "graph_1");

        let org = entities
            .iter()
            .find(|e| e.name.starts_with("Vertex Holdings"))
            .unwrap();
        assert_eq!(org.entity_type, EntityType::Company);
        assert_eq!(org.original_type.as_deref(), Some("ORGANIZATION"));
        assert_eq!(org.properties["extracted_from"], "narrative_text");

        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Metric && e.name.contains("12,500,000")));
        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Location && e.name == "California"));
        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Person && e.name.contains("Alice Moreno")));
    }

    #[test]
    fn paragraph_leads_become_risk_entities() {
        let entities = extract_entities(NARRATIVE, "doc_1", "graph_1");
        let risk = entities
            .iter()
            .find(|e| e.properties.get("extracted_from") == Some(&json!("narrative_paragraph")))
            .unwrap();
        assert_eq!(risk.entity_type, EntityType::Clause);
        assert_eq!(risk.display_type.as_deref(), Some("Risk"));
    }

    #[test]
    fn duplicates_are_suppressed() {
        let doubled = format!("{NARRATIVE}\n\n{NARRATIVE}");
        let entities = extract_entities(&doubled, "doc_1", "graph_1");
        let vertex_count = entities
            .iter()
            .filter(|e| e.name.starts_with("Vertex Holdings"))
            .count();
        assert_eq!(vertex_count, 1);
    }
}
