//! Deterministic invoice parsing.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::{json, Value};

static INVOICE_NUMBER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)invoice\s*#?:?\s*([A-Z0-9\-]+)",
        r"(?i)inv\s*#?:?\s*([A-Z0-9\-]+)",
        r"(?i)invoice\s+number:?\s*([A-Z0-9\-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static INVOICE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:invoice\s+)?date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").expect("valid regex")
});
static DUE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:due\s+date|payment\s+due):?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})")
        .expect("valid regex")
});
static SUBTOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)sub\s*total:?\s*\$?\s*([\d,]+\.?\d{0,2})").expect("valid regex")
});
static TAX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tax:?\s*\$?\s*([\d,]+\.?\d{0,2})").expect("valid regex"));
static TOTAL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)total\s+(?:amount\s+)?due:?\s*\$?\s*([\d,]+\.?\d{0,2})",
        r"(?i)(?:grand\s+)?total:?\s*\$?\s*([\d,]+\.?\d{0,2})",
        r"(?i)amount\s+due:?\s*\$?\s*([\d,]+\.?\d{0,2})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static VENDOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|vendor|seller|billed?\s+from):?\s*([^\n]+)").expect("valid regex")
});
static CORPORATE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][A-Za-z\s&,\.]+(?:Inc|LLC|Ltd|Corp|Company))").expect("valid regex")
});
static CUSTOMER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:bill\s+to|customer|buyer|sold\s+to):?\s*([^\n]+)").expect("valid regex")
});
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("valid regex")
});
static LINE_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z\s\-]+?)\s+(\d+)\s+\$?([\d,]+\.?\d{0,2})\s+\$?([\d,]+\.?\d{0,2})")
        .expect("valid regex")
});

fn first_capture(res: &[Regex], text: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn money(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

/// Extract invoice, vendor, customer and line-item entities.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let mut entities = Vec::new();

    let invoice_number = first_capture(&INVOICE_NUMBER_RES, &text);
    let mut properties: HashMap<String, Value> = HashMap::new();
    properties.insert("invoice_number".into(), json!(invoice_number));
    properties.insert(
        "invoice_date".into(),
        json!(INVOICE_DATE_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())),
    );
    properties.insert(
        "due_date".into(),
        json!(DUE_DATE_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())),
    );
    properties.insert(
        "subtotal".into(),
        json!(SUBTOTAL_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| money(m.as_str()))),
    );
    properties.insert(
        "tax".into(),
        json!(TAX_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| money(m.as_str()))),
    );
    properties.insert(
        "total".into(),
        json!(first_capture(&TOTAL_RES, &text).and_then(|v| money(&v))),
    );
    properties.insert("currency".into(), json!("USD"));
    properties.insert("status".into(), json!("pending"));

    entities.push(
        Entity::new(
            ids::entity_id(),
            EntityType::Invoice,
            format!(
                "Invoice {}",
                invoice_number.as_deref().unwrap_or("Unknown")
            ),
            document_id,
            graph_id,
        )
        .with_properties(properties)
        .with_citations(vec![Citation::section(1, "Invoice Header")]),
    );

    // Vendor (billed from).
    let vendor_name = VENDOR_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| {
            CORPORATE_NAME_RE
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        });
    if let Some(name) = vendor_name {
        let mut props: HashMap<String, Value> = HashMap::new();
        if let Some(email) = EMAIL_RE.captures(&text).and_then(|c| c.get(1)) {
            props.insert("email".into(), json!(email.as_str()));
        }
        entities.push(
            Entity::new(ids::entity_id(), EntityType::Vendor, name, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, "Vendor Information")]),
        );
    }

    // Customer (bill to).
    if let Some(captures) = CUSTOMER_RE.captures(&text) {
        let name = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if !name.is_empty() {
            entities.push(
                Entity::new(ids::entity_id(), EntityType::Company, name, document_id, graph_id)
                    .with_citations(vec![Citation::section(1, "Customer Information")]),
            );
        }
    }

    // Line items as metric entities.
    for (idx, captures) in LINE_ITEM_RE.captures_iter(&text).enumerate() {
        let description = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("description".into(), json!(description));
        props.insert(
            "quantity".into(),
            json!(captures.get(2).and_then(|m| m.as_str().parse::<i64>().ok())),
        );
        props.insert(
            "unit_price".into(),
            json!(captures.get(3).and_then(|m| money(m.as_str()))),
        );
        props.insert(
            "amount".into(),
            json!(captures.get(4).and_then(|m| money(m.as_str()))),
        );
        props.insert("category".into(), json!("invoice_line_item"));
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                description.clone(),
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, format!("Line Item {}", idx + 1))]),
        );
    }

    tracing::info!(entities = entities.len(), "invoice parser finished");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE: &str = "INVOICE #INV-2031\n\
        Invoice Date: 01/15/2026\n\
        Due Date: 02/15/2026\n\
        From: Widget Works Inc\n\
        Bill To: Acme Corporation\n\
        Widget Assembly 4 $25.00 $100.00\n\
        Subtotal: $100.00\n\
        Tax: $8.00\n\
        Total Amount Due: $108.00\n";

    #[test]
    fn extracts_invoice_vendor_customer_and_line_items() {
        let entities = extract_entities(INVOICE, "doc_1", "graph_1");

        let invoice = &entities[0];
        assert_eq!(invoice.entity_type, EntityType::Invoice);
        assert_eq!(invoice.name, "Invoice INV-2031");
        assert_eq!(invoice.properties["invoice_number"], "INV-2031");
        assert_eq!(invoice.properties["total"], 108.0);
        assert_eq!(invoice.properties["tax"], 8.0);

        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Vendor && e.name.contains("Widget Works")));
        assert!(entities
            .iter()
            .any(|e| e.entity_type == EntityType::Company && e.name.contains("Acme")));
        let line_item = entities
            .iter()
            .find(|e| e.properties.get("category") == Some(&json!("invoice_line_item")))
            .unwrap();
        assert_eq!(line_item.properties["quantity"], 4);
        assert_eq!(line_item.properties["amount"], 100.0);
    }

    #[test]
    fn missing_fields_stay_null() {
        let entities = extract_entities("statement covering consulting work", "doc_1", "graph_1");
        let invoice = &entities[0];
        assert_eq!(invoice.properties["total"], Value::Null);
        assert_eq!(invoice.name, "Invoice Unknown");
    }
}
