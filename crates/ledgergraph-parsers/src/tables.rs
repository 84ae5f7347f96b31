//! Deterministic markdown table parsing.
//!
//! Handles the HTML tables the extraction service embeds in markdown as
//! well as pipe-delimited markdown tables. Every data row becomes one
//! entity keyed by its first column; numeric cells are coerced when the
//! cleaned string is fully numeric.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::{parse_numeric_cell, to_snake_case};
use scraper::{Html, Selector};
use serde_json::Value;

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));
static DATA_CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid selector"));

const DEFAULT_MAX_ENTITIES: usize = 500;

/// Cell values that mean "no data".
const EMPTY_MARKERS: &[&str] = &["", "-", "N/A", "n/a"];

/// Fields that stay null rather than 0 when the cell is empty.
const TEXTUAL_FIELDS: &[&str] = &["county", "state", "country"];

#[derive(Debug, Clone)]
pub struct TableParser {
    max_entities: usize,
}

impl Default for TableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
        }
    }

    #[must_use]
    pub fn with_max_entities(mut self, max_entities: usize) -> Self {
        self.max_entities = max_entities;
        self
    }

    /// Extract one entity per table data row.
    #[must_use]
    pub fn extract_entities(
        &self,
        markdown: &str,
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Entity> {
        let mut entities = self.parse_html_tables(markdown, document_id, graph_id);
        if entities.len() < self.max_entities {
            let remaining = self.max_entities - entities.len();
            entities.extend(
                self.parse_pipe_tables(markdown, document_id, graph_id)
                    .into_iter()
                    .take(remaining),
            );
        }
        tracing::info!(entities = entities.len(), "table parser finished");
        entities
    }

    fn parse_html_tables(
        &self,
        markdown: &str,
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Entity> {
        if !markdown.contains("<table") {
            return Vec::new();
        }
        let document = Html::parse_fragment(markdown);
        let mut entities = Vec::new();

        for (table_idx, table) in document.select(&TABLE_SELECTOR).enumerate() {
            if entities.len() >= self.max_entities {
                break;
            }

            let rows: Vec<Vec<String>> = table
                .select(&ROW_SELECTOR)
                .map(|row| {
                    row.select(&CELL_SELECTOR)
                        .map(|cell| cell.text().collect::<String>().trim().to_string())
                        .collect()
                })
                .collect();
            let (headers, header_row_idx) = choose_header_row(&rows);
            if headers.is_empty() {
                tracing::warn!(table = table_idx, "no headers found, skipping table");
                continue;
            }

            // Data rows start after the chosen header row. Re-select so
            // only <td> rows count as data.
            let data_rows: Vec<Vec<String>> = table
                .select(&ROW_SELECTOR)
                .skip(header_row_idx + 1)
                .map(|row| {
                    row.select(&DATA_CELL_SELECTOR)
                        .map(|cell| cell.text().collect::<String>().trim().to_string())
                        .collect()
                })
                .collect();

            for (row_idx, values) in data_rows.into_iter().enumerate() {
                if entities.len() >= self.max_entities {
                    break;
                }
                if values.len() < 2 {
                    continue;
                }
                // An all-text first data row is usually an echoed header.
                let has_number = values.iter().any(|v| v.chars().any(|c| c.is_ascii_digit()));
                if row_idx == 0 && !has_number {
                    continue;
                }
                if let Some(entity) = entity_from_row(
                    &headers,
                    &values,
                    table_idx,
                    row_idx,
                    document_id,
                    graph_id,
                ) {
                    entities.push(entity);
                }
            }
        }
        entities
    }

    fn parse_pipe_tables(
        &self,
        markdown: &str,
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Entity> {
        let mut entities = Vec::new();
        let lines: Vec<&str> = markdown.lines().collect();
        let mut i = 0usize;
        let mut table_idx = 0usize;

        while i < lines.len() && entities.len() < self.max_entities {
            let line = lines[i].trim();
            if line.starts_with('|') && line.matches('|').count() >= 3 {
                let mut table_lines = Vec::new();
                while i < lines.len() && lines[i].trim().starts_with('|') {
                    table_lines.push(lines[i].trim());
                    i += 1;
                }
                if table_lines.len() >= 2 {
                    entities.extend(pipe_table_entities(
                        &table_lines,
                        table_idx,
                        document_id,
                        graph_id,
                        self.max_entities - entities.len(),
                    ));
                    table_idx += 1;
                }
            } else {
                i += 1;
            }
        }
        entities
    }
}

/// The header row is the row with the most non-empty cleaned cells among
/// the first three rows.
fn choose_header_row(rows: &[Vec<String>]) -> (Vec<String>, usize) {
    let mut best: Vec<String> = Vec::new();
    let mut best_idx = 0usize;
    let mut best_non_empty = 0usize;

    for (idx, row) in rows.iter().take(3).enumerate() {
        let cleaned: Vec<String> = row.iter().map(|cell| to_snake_case(cell)).collect();
        let non_empty = cleaned.iter().filter(|h| h.as_str() != "column").count();
        if cleaned.len() > best.len() || non_empty > best_non_empty {
            best_non_empty = non_empty;
            best = cleaned;
            best_idx = idx;
        }
    }
    (best, best_idx)
}

fn entity_from_row(
    headers: &[String],
    values: &[String],
    table_idx: usize,
    row_idx: usize,
    document_id: &str,
    graph_id: &str,
) -> Option<Entity> {
    let name = values.first().filter(|v| !v.is_empty())?.clone();
    let entity_type = classify_first_column(&name);

    let mut properties: HashMap<String, Value> = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        if header == "column" {
            continue;
        }
        let value = values.get(i).map(String::as_str).unwrap_or("");
        if i == 0 {
            if !value.is_empty() {
                properties.insert(header.clone(), Value::String(value.to_string()));
            }
            continue;
        }
        if EMPTY_MARKERS.contains(&value) {
            // Empty textual fields stay null; empty numeric columns read 0.
            let filler = if TEXTUAL_FIELDS.contains(&header.as_str()) {
                Value::Null
            } else {
                Value::from(0)
            };
            properties.insert(header.clone(), filler);
            continue;
        }
        let coerced = parse_numeric_cell(value).unwrap_or_else(|| Value::String(value.to_string()));
        properties.insert(header.clone(), coerced);
    }

    if properties.is_empty() {
        return None;
    }

    let citation = Citation::section(1, format!("Table {}, Row {}", table_idx + 1, row_idx + 1));
    Some(
        Entity::new(ids::entity_id(), entity_type, name, document_id, graph_id)
            .with_properties(properties)
            .with_citations(vec![citation]),
    )
}

fn classify_first_column(value: &str) -> EntityType {
    let lower = value.to_lowercase();
    if ["company", "corp", "inc", "llc"].iter().any(|kw| lower.contains(kw)) {
        EntityType::Company
    } else {
        // Municipal tables dominate this corpus; rows default to locations.
        EntityType::Location
    }
}

fn pipe_table_entities(
    lines: &[&str],
    table_idx: usize,
    document_id: &str,
    graph_id: &str,
    limit: usize,
) -> Vec<Entity> {
    let mut entities = Vec::new();
    let headers: Vec<String> = lines[0]
        .split('|')
        .skip(1)
        .map(|cell| to_snake_case(cell.trim()))
        .collect();
    let headers = &headers[..headers.len().saturating_sub(1)];
    if headers.is_empty() {
        return entities;
    }

    let start_row = if lines.len() > 1 && lines[1].contains('-') {
        2
    } else {
        1
    };

    for (row_idx, line) in lines[start_row..].iter().enumerate() {
        if entities.len() >= limit {
            break;
        }
        let cells: Vec<&str> = {
            let mut cells: Vec<&str> = line.split('|').skip(1).map(str::trim).collect();
            cells.pop();
            cells
        };
        if cells.len() != headers.len() {
            continue;
        }
        let Some(name) = cells.first().filter(|c| !c.is_empty()) else {
            continue;
        };

        let mut properties: HashMap<String, Value> = HashMap::new();
        for (header, value) in headers.iter().zip(&cells).skip(1) {
            if EMPTY_MARKERS.contains(value) {
                continue;
            }
            let coerced =
                parse_numeric_cell(value).unwrap_or_else(|| Value::String((*value).to_string()));
            properties.insert(header.clone(), coerced);
        }
        if properties.is_empty() {
            continue;
        }

        let citation = Citation::section(
            1,
            format!("Pipe Table {}, Row {}", table_idx + 1, row_idx + 1),
        );
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                (*name).to_string(),
                document_id,
                graph_id,
            )
            .with_properties(properties)
            .with_citations(vec![citation]),
        );
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUNICIPAL_TABLE: &str = r#"
<table>
<tr><td>Ohio Municipal Financial Data</td></tr>
<tr><th>City</th><th>County</th><th>Total Assets</th><th>Accounts Payable</th></tr>
<tr><td>Akron</td><td>Summit</td><td>1,200,000</td><td>50,000</td></tr>
<tr><td>Canton</td><td>Stark</td><td>800,500.25</td><td>-</td></tr>
<tr><td>Cleveland</td><td></td><td>5,000,000</td><td>120,000</td></tr>
</table>
"#;

    #[test]
    fn rows_become_location_entities_keyed_by_first_column() {
        let entities = TableParser::new().extract_entities(MUNICIPAL_TABLE, "doc_1", "graph_1");
        assert_eq!(entities.len(), 3);

        let akron = &entities[0];
        assert_eq!(akron.name, "Akron");
        assert_eq!(akron.entity_type, EntityType::Location);
        assert_eq!(akron.properties["county"], "Summit");
        assert_eq!(akron.properties["total_assets"], 1_200_000);
        assert_eq!(akron.properties["city"], "Akron");
        assert_eq!(
            akron.citations[0].section.as_deref(),
            Some("Table 1, Row 1")
        );
    }

    #[test]
    fn numeric_coercion_and_empty_cells() {
        let entities = TableParser::new().extract_entities(MUNICIPAL_TABLE, "doc_1", "graph_1");
        let canton = &entities[1];
        assert_eq!(canton.properties["total_assets"], 800_500.25);
        // Empty numeric cell reads 0.
        assert_eq!(canton.properties["accounts_payable"], 0);
        // Empty county stays null.
        let cleveland = &entities[2];
        assert_eq!(cleveland.properties["county"], Value::Null);
    }

    #[test]
    fn company_rows_classify_as_companies() {
        let md = "<table><tr><th>Company</th><th>Revenue</th></tr>\
                  <tr><td>Acme Inc</td><td>1000</td></tr></table>";
        let entities = TableParser::new().extract_entities(md, "doc_1", "graph_1");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::Company);
    }

    #[test]
    fn pipe_tables_parse_without_html() {
        let md = "| Metric | Q4 |\n|--------|----|\n| Revenue | 1,500 |\n| EBITDA | 300 |\n";
        let entities = TableParser::new().extract_entities(md, "doc_1", "graph_1");
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "Revenue");
        assert_eq!(entities[0].entity_type, EntityType::Metric);
        assert_eq!(entities[0].properties["q4"], 1500);
    }

    #[test]
    fn entity_cap_is_respected() {
        let mut md = String::from("<table><tr><th>City</th><th>Value</th></tr>");
        for i in 0..20 {
            md.push_str(&format!("<tr><td>City{i}</td><td>{i}</td></tr>"));
        }
        md.push_str("</table>");
        let entities = TableParser::new()
            .with_max_entities(5)
            .extract_entities(&md, "doc_1", "graph_1");
        assert_eq!(entities.len(), 5);
    }
}
