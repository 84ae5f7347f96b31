//! Deterministic email parsing: headers and body.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::{json, Value};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(From|To|Subject|Date|Cc|Bcc):\s*(.+)$").expect("valid regex")
});

/// Extract sender/recipient person entities and a clause holding the
/// message body.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut body_start = 0usize;
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if let Some(captures) = HEADER_RE.captures(line.trim()) {
            let key = captures
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let value = captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            headers.insert(key, value);
        } else if line.trim().is_empty() && !headers.is_empty() {
            body_start = i + 1;
            break;
        }
    }
    let body = lines
        .get(body_start..)
        .map(|rest| rest.join("\n").trim().to_string())
        .unwrap_or_default();

    let mut entities = Vec::new();
    for (role, header) in [("sender", "from"), ("recipient", "to")] {
        let Some(name) = headers.get(header).filter(|v| !v.is_empty()) else {
            continue;
        };
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("role".into(), json!(role));
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Person,
                name.clone(),
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Email Headers")]),
        );
    }

    let subject = headers.get("subject").cloned();
    let mut props: HashMap<String, Value> = HashMap::new();
    props.insert("subject".into(), json!(subject));
    props.insert("date".into(), json!(headers.get("date")));
    props.insert("body".into(), json!(body.chars().take(500).collect::<String>()));
    entities.push(
        Entity::new(
            ids::entity_id(),
            EntityType::Clause,
            subject.unwrap_or_else(|| "Email Message".to_string()),
            document_id,
            graph_id,
        )
        .with_properties(props)
        .with_citations(vec![Citation::section(1, "Email Body")]),
    );

    tracing::info!(entities = entities.len(), "email parser finished");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "From: Pat Smith\nTo: Casey Jones\nSubject: Q4 covenant review\nDate: 01/20/2026\n\nPlease review the attached covenant schedule before Friday.\n";

    #[test]
    fn extracts_people_and_body() {
        let entities = extract_entities(EMAIL, "doc_1", "graph_1");

        let sender = entities.iter().find(|e| e.name == "Pat Smith").unwrap();
        assert_eq!(sender.entity_type, EntityType::Person);
        assert_eq!(sender.properties["role"], "sender");
        assert!(entities.iter().any(|e| e.name == "Casey Jones"));

        let message = entities
            .iter()
            .find(|e| e.name == "Q4 covenant review")
            .unwrap();
        assert_eq!(message.entity_type, EntityType::Clause);
        assert!(message.properties["body"]
            .as_str()
            .unwrap()
            .contains("covenant schedule"));
    }
}
