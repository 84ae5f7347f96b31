//! Deterministic markdown-to-JSON-schema inference.
//!
//! Inspects parsed markdown for HTML or pipe-delimited tables and builds
//! an extraction schema from their headers; table-free documents get a
//! domain template chosen by keyword. Never fails: the worst case is the
//! default single-property schema.

use std::sync::LazyLock;

use ledgergraph::text::to_snake_case;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{json, Value};

static PIPE_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|[\s\-:]+\|").expect("valid regex"));

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

const NUMERIC_KEYWORDS: &[&str] = &[
    "amount",
    "total",
    "balance",
    "price",
    "cost",
    "value",
    "count",
    "quantity",
    "number",
    "rate",
    "percent",
    "tax",
    "receivable",
    "payable",
    "asset",
    "liability",
    "equity",
    "revenue",
    "expense",
    "income",
    "cash",
    "investment",
];

/// Analyzes markdown structure and generates an extraction schema for it.
#[derive(Debug, Clone, Default)]
pub struct SchemaAnalyzer;

impl SchemaAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The minimal default schema used when synthesis is disabled or the
    /// adaptive extract fails.
    #[must_use]
    pub fn default_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"}
            }
        })
    }

    /// Generate a schema for the given markdown.
    #[must_use]
    pub fn analyze(&self, markdown: &str) -> Value {
        let schema = if markdown.contains("<table") {
            self.schema_from_html_tables(markdown)
        } else if Self::has_pipe_tables(markdown) {
            self.schema_from_pipe_tables(markdown)
        } else {
            self.generic_schema(markdown)
        };
        tracing::debug!(
            properties = schema["properties"].as_object().map_or(0, |p| p.len()),
            "synthesized extraction schema"
        );
        schema
    }

    fn has_pipe_tables(markdown: &str) -> bool {
        let lines: Vec<&str> = markdown.lines().take(101).collect();
        lines.windows(2).any(|pair| {
            pair[0].contains('|') && PIPE_SEPARATOR_RE.is_match(pair[1])
        })
    }

    fn schema_from_html_tables(&self, markdown: &str) -> Value {
        let document = Html::parse_fragment(markdown);
        // Union headers across tables in first-seen order; later tables are
        // often continuations of the same logical table.
        let mut headers: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut table_count = 0usize;

        for table in document.select(&TABLE_SELECTOR) {
            table_count += 1;
            for header in best_header_row(
                table
                    .select(&ROW_SELECTOR)
                    .map(|row| {
                        row.select(&CELL_SELECTOR)
                            .map(|cell| cell.text().collect::<String>().trim().to_string())
                            .collect::<Vec<_>>()
                    })
                    .collect(),
            ) {
                if seen.insert(header.clone()) {
                    headers.push(header);
                }
            }
        }

        if headers.is_empty() {
            tracing::warn!("tables present but no headers extracted, using generic schema");
            return self.generic_schema(markdown);
        }
        tracing::debug!(columns = headers.len(), tables = table_count, "table headers detected");
        Self::schema_from_headers(&headers)
    }

    fn schema_from_pipe_tables(&self, markdown: &str) -> Value {
        let lines: Vec<&str> = markdown.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if line.contains('|')
                && i + 1 < lines.len()
                && PIPE_SEPARATOR_RE.is_match(lines[i + 1])
            {
                let headers: Vec<String> = line
                    .split('|')
                    .map(str::trim)
                    .filter(|cell| !cell.is_empty())
                    .map(to_snake_case)
                    .collect();
                if !headers.is_empty() {
                    return Self::schema_from_headers(&headers);
                }
            }
        }
        self.generic_schema(markdown)
    }

    fn schema_from_headers(headers: &[String]) -> Value {
        let identifier = headers.first().cloned().unwrap_or_else(|| "id".to_string());
        let mut properties = serde_json::Map::new();
        for header in headers {
            properties.insert(header.clone(), json!({"type": infer_field_type(header)}));
        }
        json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Auto-generated Schema from Table Structure",
            "type": "object",
            "properties": {
                array_name(headers): {
                    "type": "array",
                    "description": "Extracted table data",
                    "items": {
                        "type": "object",
                        "required": [identifier],
                        "properties": properties
                    }
                }
            }
        })
    }

    fn generic_schema(&self, markdown: &str) -> Value {
        let lower = markdown.to_lowercase();
        if ["invoice", "bill", "receipt"].iter().any(|w| lower.contains(w)) {
            invoice_schema()
        } else if ["contract", "agreement"].iter().any(|w| lower.contains(w)) {
            contract_schema()
        } else if ["financial", "balance sheet", "income statement"]
            .iter()
            .any(|w| lower.contains(w))
        {
            financial_schema()
        } else {
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "title": "Document Data",
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "summary": {"type": "string"},
                    "key_entities": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "type": {"type": "string"},
                                "value": {"type": "string"}
                            }
                        }
                    }
                }
            })
        }
    }
}

/// Choose the header row among the first three rows of a table: the row
/// with the most non-empty cleaned cells wins. Some tables lead with a
/// category label row, so the first row is not always the header.
fn best_header_row(rows: Vec<Vec<String>>) -> Vec<String> {
    let mut best: Vec<String> = Vec::new();
    let mut best_non_empty = 0usize;
    for row in rows.into_iter().take(3) {
        let cleaned: Vec<String> = row
            .iter()
            .filter(|text| !text.is_empty() && text.len() < 100)
            .map(|text| to_snake_case(text))
            .filter(|snake| snake != "column" && snake != "field")
            .collect();
        if cleaned.len() > best_non_empty {
            best_non_empty = cleaned.len();
            best = cleaned;
        }
    }
    best
}

fn array_name(headers: &[String]) -> &'static str {
    let contains = |needle: &str| headers.iter().any(|h| h.to_lowercase().contains(needle));
    if contains("city") {
        "cities"
    } else if contains("company") || contains("organization") {
        "companies"
    } else if contains("person") || contains("employee") {
        "people"
    } else if contains("product") || contains("item") {
        "items"
    } else if contains("transaction") || contains("payment") {
        "transactions"
    } else {
        "records"
    }
}

fn infer_field_type(field_name: &str) -> &'static str {
    let lower = field_name.to_lowercase();
    if NUMERIC_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        "number"
    } else {
        "string"
    }
}

fn invoice_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Invoice",
        "type": "object",
        "properties": {
            "invoice_number": {"type": "string"},
            "date": {"type": "string"},
            "vendor": {"type": "string"},
            "customer": {"type": "string"},
            "total_amount": {"type": "number"},
            "line_items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "quantity": {"type": "number"},
                        "unit_price": {"type": "number"},
                        "amount": {"type": "number"}
                    }
                }
            }
        }
    })
}

fn contract_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Contract",
        "type": "object",
        "properties": {
            "contract_title": {"type": "string"},
            "effective_date": {"type": "string"},
            "parties": {"type": "array", "items": {"type": "string"}},
            "terms": {"type": "array", "items": {"type": "string"}},
            "signatures": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "party": {"type": "string"},
                        "date": {"type": "string"}
                    }
                }
            }
        }
    })
}

fn financial_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Financial Statement",
        "type": "object",
        "properties": {
            "report_title": {"type": "string"},
            "period": {"type": "string"},
            "entity": {"type": "string"},
            "financial_metrics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "metric_name": {"type": "string"},
                        "value": {"type": "number"},
                        "category": {"type": "string"}
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITY_TABLE: &str = r#"
<table>
<tr><td>Ohio Municipal Financial Data</td></tr>
<tr><th>City</th><th>County</th><th>Total Assets</th><th>Accounts Payable</th></tr>
<tr><td>Akron</td><td>Summit</td><td>1,200,000</td><td>50,000</td></tr>
</table>
"#;

    #[test]
    fn html_table_schema_uses_best_header_row() {
        let schema = SchemaAnalyzer::new().analyze(CITY_TABLE);
        let items = &schema["properties"]["cities"]["items"]["properties"];
        assert!(items.get("city").is_some());
        assert!(items.get("county").is_some());
        assert_eq!(items["total_assets"]["type"], "number");
        assert_eq!(items["county"]["type"], "string");
    }

    #[test]
    fn headers_union_across_continuation_tables() {
        let md = format!(
            "{CITY_TABLE}\n<table><tr><th>City</th><th>Net Pension Liability</th></tr><tr><td>Toledo</td><td>9</td></tr></table>"
        );
        let schema = SchemaAnalyzer::new().analyze(&md);
        let items = &schema["properties"]["cities"]["items"]["properties"];
        assert!(items.get("net_pension_liability").is_some());
        // First-seen order: identifier is still the first table's first column.
        let required = schema["properties"]["cities"]["items"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required[0], "city");
    }

    #[test]
    fn pipe_tables_are_recognised() {
        let md = "| Name | Amount |\n|------|--------|\n| A | 5 |\n";
        let schema = SchemaAnalyzer::new().analyze(md);
        let items = &schema["properties"]["records"]["items"]["properties"];
        assert_eq!(items["amount"]["type"], "number");
        assert_eq!(items["name"]["type"], "string");
    }

    #[test]
    fn keyword_fallback_picks_domain_template() {
        let schema = SchemaAnalyzer::new().analyze("INVOICE #42\nBill To: Acme\nTotal: $99");
        assert_eq!(schema["title"], "Invoice");

        let schema = SchemaAnalyzer::new().analyze("This Agreement is made between A and B.");
        assert_eq!(schema["title"], "Contract");

        let schema = SchemaAnalyzer::new().analyze("plain narrative text with no structure");
        assert_eq!(schema["title"], "Document Data");
    }

    #[test]
    fn never_fails_on_degenerate_input() {
        let schema = SchemaAnalyzer::new().analyze("");
        assert!(schema["properties"].is_object());
        let schema = SchemaAnalyzer::new().analyze("<table></table>");
        assert!(schema["properties"].is_object());
    }
}
