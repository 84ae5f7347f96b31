//! Deterministic contract parsing: parties, sections, obligations.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::{json, Value};

static PARTIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)between\s+(.+?)\s+and\s+(.+?)(?:\.|,)").expect("valid regex")
});
static EFFECTIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)effective\s+date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").expect("valid regex")
});
static GOVERNING_LAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)governed\s+by\s+the\s+laws\s+of\s+([^\.\n,]+)").expect("valid regex")
});
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:#+\s*)?((?:\d+\.?\s+[A-Z][A-Za-z\s]+)|(?:ARTICLE\s+[IVX\d]+[^\n]*)|(?:Section\s+\d+\.?\d*[^\n]*))\s*$")
        .expect("valid regex")
});
static OBLIGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:party|parties|buyer|seller|borrower|company|contractor)\s+shall\s+([^\.]{10,200})\.")
        .expect("valid regex")
});

const CORPORATE_SUFFIXES: &[&str] = &["INC", "LLC", "CORP", "LTD", "COMPANY"];
const MAX_OBLIGATIONS: usize = 10;

fn party_entity_type(name: &str) -> EntityType {
    let upper = name.to_uppercase();
    if CORPORATE_SUFFIXES.iter().any(|s| upper.contains(s)) {
        EntityType::Company
    } else {
        EntityType::Person
    }
}

/// Extract the contract record, its parties, section clauses and explicit
/// obligations.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let mut entities = Vec::new();

    let mut properties: HashMap<String, Value> = HashMap::new();
    properties.insert(
        "effective_date".into(),
        json!(EFFECTIVE_DATE_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())),
    );
    properties.insert(
        "governing_law".into(),
        json!(GOVERNING_LAW_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())),
    );
    entities.push(
        Entity::new(
            ids::entity_id(),
            EntityType::Clause,
            "Contract Agreement",
            document_id,
            graph_id,
        )
        .with_properties(properties)
        .with_citations(vec![Citation::section(1, "Contract Header")]),
    );

    // Parties. Corporate suffixes decide company versus person.
    if let Some(captures) = PARTIES_RE.captures(&text) {
        for index in 1..=2 {
            let Some(name) = captures.get(index).map(|m| m.as_str().trim()) else {
                continue;
            };
            if name.is_empty() || name.len() > 120 {
                continue;
            }
            let role = if index == 1 { "first_party" } else { "second_party" };
            let mut props: HashMap<String, Value> = HashMap::new();
            props.insert("role".into(), json!(role));
            entities.push(
                Entity::new(
                    ids::entity_id(),
                    party_entity_type(name),
                    name,
                    document_id,
                    graph_id,
                )
                .with_properties(props)
                .with_citations(vec![Citation::section(1, "Parties")]),
            );
        }
    }

    // Sections become clause entities.
    for captures in SECTION_RE.captures_iter(&text) {
        let Some(title) = captures.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("clause_type".into(), json!("section"));
        entities.push(
            Entity::new(ids::entity_id(), EntityType::Clause, title, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, title)]),
        );
    }

    // Explicit "shall" obligations.
    for captures in OBLIGATION_RE.captures_iter(&text).take(MAX_OBLIGATIONS) {
        let Some(description) = captures.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        let summary: String = description.chars().take(60).collect();
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("description".into(), json!(description));
        props.insert("clause_type".into(), json!("obligation"));
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Clause,
                format!("Obligation: {summary}"),
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Obligations")]),
        );
    }

    tracing::info!(entities = entities.len(), "contract parser finished");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "SERVICE AGREEMENT\n\
        This Agreement is made between Widget Works Inc and Jane Doe.\n\
        Effective Date: 03/01/2026\n\
        This Agreement shall be governed by the laws of Ohio.\n\
        1. Definitions\n\
        The Contractor shall deliver monthly progress reports to the client.\n";

    #[test]
    fn extracts_contract_parties_and_obligations() {
        let entities = extract_entities(CONTRACT, "doc_1", "graph_1");

        assert_eq!(entities[0].name, "Contract Agreement");
        assert_eq!(entities[0].properties["effective_date"], "03/01/2026");
        assert_eq!(entities[0].properties["governing_law"], "Ohio");

        let company = entities
            .iter()
            .find(|e| e.name == "Widget Works Inc")
            .unwrap();
        assert_eq!(company.entity_type, EntityType::Company);
        let person = entities.iter().find(|e| e.name == "Jane Doe").unwrap();
        assert_eq!(person.entity_type, EntityType::Person);

        assert!(entities
            .iter()
            .any(|e| e.name.starts_with("Obligation:")
                && e.properties["clause_type"] == "obligation"));
    }
}
