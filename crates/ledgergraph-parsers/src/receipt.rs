//! Deterministic receipt parsing: store, line items, total.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::{json, Value};

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").expect("valid regex"));
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AP]M)?)").expect("valid regex")
});
static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([A-Za-z][A-Za-z\s\-]{2,40}?)\s+\$?([\d,]+\.\d{2})\s*$").expect("valid regex")
});
static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)total:?\s*\$?\s*([\d,]+\.\d{2})").expect("valid regex")
});

/// Extract the store, line items and total from a receipt.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let mut entities = Vec::new();

    // The store name is conventionally the first non-empty line.
    let store = text.lines().map(str::trim).find(|l| !l.is_empty());
    if let Some(store) = store {
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert(
            "date".into(),
            json!(DATE_RE.captures(&text).and_then(|c| c.get(1)).map(|m| m.as_str())),
        );
        props.insert(
            "time".into(),
            json!(TIME_RE.captures(&text).and_then(|c| c.get(1)).map(|m| m.as_str())),
        );
        entities.push(
            Entity::new(ids::entity_id(), EntityType::Vendor, store, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, "Receipt Header")]),
        );
    }

    for (idx, captures) in ITEM_RE.captures_iter(&text).enumerate() {
        let item = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if item.to_lowercase().contains("total") {
            continue;
        }
        let price: Option<f64> = captures
            .get(2)
            .and_then(|m| m.as_str().replace(',', "").parse().ok());
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("price".into(), json!(price));
        props.insert("category".into(), json!("receipt_line_item"));
        entities.push(
            Entity::new(ids::entity_id(), EntityType::Metric, item, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, format!("Line Item {}", idx + 1))]),
        );
    }

    if let Some(total) = TOTAL_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
    {
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("value".into(), json!(total));
        props.insert("unit".into(), json!("USD"));
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                "Receipt Total",
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Totals")]),
        );
    }

    tracing::info!(entities = entities.len(), "receipt parser finished");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT: &str = "Corner Grocery\n03/12/2026 14:32\nMilk  3.49\nBread  2.99\nTotal: $6.48\n";

    #[test]
    fn extracts_store_items_and_total() {
        let entities = extract_entities(RECEIPT, "doc_1", "graph_1");

        let store = &entities[0];
        assert_eq!(store.entity_type, EntityType::Vendor);
        assert_eq!(store.name, "Corner Grocery");
        assert_eq!(store.properties["date"], "03/12/2026");

        assert!(entities.iter().any(|e| e.name == "Milk"));
        assert!(entities.iter().any(|e| e.name == "Bread"));
        let total = entities.iter().find(|e| e.name == "Receipt Total").unwrap();
        assert_eq!(total.properties["value"], 6.48);
    }
}
