//! The normalizer: layered entity extraction with monotone-quality
//! cascade selection, followed by edge assembly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{
    dedup_edges, Citation, Edge, Entity, EntityType, ExtractionRecord,
};
use ledgergraph::Result;
use ledgergraph_bedrock::CompletionModel;
use ledgergraph_parsers::{
    contract, email, invoice, loan, narrative, receipt, DocumentType, DocumentTypeDetector,
    TableParser,
};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::narrative_llm::NarrativeLlmParser;
use crate::relationships::RelationshipDetector;

/// A schema extraction this large is trusted outright.
const GOOD_EXTRACTION_THRESHOLD: usize = 20;
/// Below this entity count a long document is treated as narrative.
const NARRATIVE_ENTITY_THRESHOLD: usize = 5;
/// Markdown length that marks a document as long.
const NARRATIVE_MARKDOWN_THRESHOLD: usize = 10_000;

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr>(.*?)</tr>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<t[dh][^>]*>(.*?)</t[dh]>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").expect("valid regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d{1,2})?)%").expect("valid regex"));
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]+)?)\s*([MBKmbk])?").expect("valid regex")
});

/// The product of one normalization run.
#[derive(Debug, Clone)]
pub struct NormalizedGraph {
    pub graph_id: String,
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
}

/// Map a source type label onto the closed entity-type set.
fn map_entity_type(raw: &str) -> Option<EntityType> {
    match raw.to_uppercase().as_str() {
        "ORGANIZATION" | "COMPANY" => Some(EntityType::Company),
        "SUBSIDIARY" => Some(EntityType::Subsidiary),
        "LOAN" | "DEBT" => Some(EntityType::Loan),
        "INVOICE" => Some(EntityType::Invoice),
        "METRIC" | "FINANCIAL_METRIC" => Some(EntityType::Metric),
        "CONTRACT" | "CLAUSE" | "OTHER" => Some(EntityType::Clause),
        "PERSON" => Some(EntityType::Person),
        "LOCATION" => Some(EntityType::Location),
        "VENDOR" => Some(EntityType::Vendor),
        _ => None,
    }
}

/// Flatten one level of nesting: objects become prefixed scalar entries,
/// arrays are kept as JSON strings. Entity properties stay a flat map.
fn flatten_properties(raw: &Map<String, Value>) -> HashMap<String, Value> {
    let mut flat = HashMap::new();
    for (key, value) in raw {
        match value {
            Value::Object(nested) => {
                for (sub_key, sub_value) in nested {
                    let flattened_key = format!("{key}_{sub_key}");
                    if sub_value.is_object() || sub_value.is_array() {
                        flat.insert(
                            flattened_key,
                            Value::String(sub_value.to_string()),
                        );
                    } else {
                        flat.insert(flattened_key, sub_value.clone());
                    }
                }
            }
            Value::Array(_) => {
                flat.insert(key.clone(), Value::String(value.to_string()));
            }
            other => {
                flat.insert(key.clone(), other.clone());
            }
        }
    }
    flat
}

/// Converts extraction records into knowledge-graph entities and edges.
pub struct Normalizer {
    detector: RelationshipDetector,
    narrative_llm: NarrativeLlmParser,
    table_parser: TableParser,
    doc_type_detector: DocumentTypeDetector,
}

impl Normalizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            detector: RelationshipDetector::new(model.clone()),
            narrative_llm: NarrativeLlmParser::new(model),
            table_parser: TableParser::new(),
            doc_type_detector: DocumentTypeDetector::new(),
        }
    }

    /// Run the cascade and assemble edges. Each call produces a fresh
    /// graph id; installing it supersedes prior graphs for the document.
    pub async fn normalize(
        &self,
        record: &ExtractionRecord,
        document_id: &str,
    ) -> Result<NormalizedGraph> {
        let graph_id = ids::graph_id();
        tracing::info!(document_id, graph_id = %graph_id, "normalizing extraction output");

        let (entities, narrative_edges) =
            self.select_entities(record, document_id, &graph_id).await?;
        let is_narrative_path = !narrative_edges.is_empty()
            || entities.iter().any(|e| {
                matches!(
                    e.properties.get("extracted_from").and_then(Value::as_str),
                    Some("narrative_llm") | Some("narrative_text") | Some("narrative_paragraph")
                )
            });

        // Narrative entities already carry context-derived relationships,
        // so the chunked LLM pass would only re-extract the same facts.
        let llm_edges = if is_narrative_path {
            tracing::info!("skipping LLM relationship detection for narrative entities");
            Vec::new()
        } else {
            self.detector
                .detect_relationships_chunked(&entities, &graph_id)
                .await
                .unwrap_or_default()
        };

        let mut edges =
            self.detector
                .enhance_with_heuristics(llm_edges, &entities, &graph_id, &narrative_edges);
        edges.extend(narrative_edges);
        let edges = dedup_edges(edges);

        tracing::info!(
            entities = entities.len(),
            edges = edges.len(),
            "normalization finished"
        );
        Ok(NormalizedGraph {
            graph_id,
            entities,
            edges,
        })
    }

    /// Cascade selection across the extraction strategies.
    async fn select_entities(
        &self,
        record: &ExtractionRecord,
        document_id: &str,
        graph_id: &str,
    ) -> Result<(Vec<Entity>, Vec<Edge>)> {
        let markdown = record.markdown.as_str();

        let schema_entities = self.schema_based_entities(record, document_id, graph_id);
        tracing::info!(count = schema_entities.len(), "schema extraction produced entities");

        // The deterministic table set is always computed; even when the
        // schema set wins it donates missing properties.
        let deterministic = self
            .table_parser
            .extract_entities(markdown, document_id, graph_id);
        let deterministic_map = build_deterministic_map(&deterministic);
        let county_lookup = derive_county_lookup(markdown);

        if schema_entities.len() >= GOOD_EXTRACTION_THRESHOLD {
            tracing::info!(count = schema_entities.len(), "keeping schema extraction");
            let merged =
                merge_with_deterministic(schema_entities, &deterministic_map, &county_lookup);
            return Ok((merged, Vec::new()));
        }

        // Specialized parser by detected document type; financial
        // statements and generic documents stay with the table parser.
        let specialized = if markdown.is_empty() {
            deterministic.clone()
        } else {
            let detection = self.doc_type_detector.detect(markdown);
            tracing::info!(doc_type = ?detection.doc_type, confidence = detection.confidence, "document type");
            match detection.doc_type {
                DocumentType::Invoice => invoice::extract_entities(markdown, document_id, graph_id),
                DocumentType::Contract => {
                    contract::extract_entities(markdown, document_id, graph_id)
                }
                DocumentType::LoanDocument => {
                    loan::extract_entities(markdown, document_id, graph_id)
                }
                DocumentType::Receipt => receipt::extract_entities(markdown, document_id, graph_id),
                DocumentType::Email => email::extract_entities(markdown, document_id, graph_id),
                _ => deterministic.clone(),
            }
        };
        tracing::info!(count = specialized.len(), "deterministic extraction produced entities");

        let best_count = specialized.len().max(schema_entities.len());
        if best_count < NARRATIVE_ENTITY_THRESHOLD
            && markdown.len() > NARRATIVE_MARKDOWN_THRESHOLD
        {
            tracing::info!(
                best_count,
                markdown_len = markdown.len(),
                "narrative document detected, using LLM narrative parser"
            );
            match self.narrative_llm.extract(markdown, document_id, graph_id).await {
                Ok((entities, edges)) if !entities.is_empty() => {
                    let merged =
                        merge_with_deterministic(entities, &deterministic_map, &county_lookup);
                    return Ok((merged, edges));
                }
                Ok(_) => {
                    tracing::warn!("narrative LLM extraction found nothing, trying pattern mode");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "narrative LLM extraction failed, trying pattern mode");
                }
            }
            let pattern_entities = narrative::extract_entities(markdown, document_id, graph_id);
            if !pattern_entities.is_empty() {
                let merged =
                    merge_with_deterministic(pattern_entities, &deterministic_map, &county_lookup);
                return Ok((merged, Vec::new()));
            }
        }

        // Adopt whichever strategy produced more entities.
        let selected = if specialized.len() > schema_entities.len() {
            tracing::info!("deterministic extraction wins the cascade");
            specialized
        } else {
            tracing::info!("schema extraction wins the cascade");
            schema_entities
        };
        Ok((
            merge_with_deterministic(selected, &deterministic_map, &county_lookup),
            Vec::new(),
        ))
    }

    /// Schema-based extraction: decode reported entities, known key-value
    /// structures, generic arrays and tables, with a summary-only fallback.
    fn schema_based_entities(
        &self,
        record: &ExtractionRecord,
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Entity> {
        let mut entities = Vec::new();

        for raw in &record.entities {
            let Some(entity_type) = raw.entity_type.as_deref().and_then(map_entity_type) else {
                continue;
            };
            let Some(name) = raw.name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            entities.push(
                Entity::new(ids::entity_id(), entity_type, name, document_id, graph_id)
                    .with_properties(flatten_properties(&raw.properties))
                    .with_citations(raw.citations.clone()),
            );
        }

        for kv in &record.key_values {
            entities.extend(self.entities_from_key_value(
                &kv.key,
                &kv.value,
                document_id,
                graph_id,
            ));
        }

        // Debt schedule tables become loan entities.
        for table in &record.tables {
            let caption = table.caption.as_deref().unwrap_or("").to_lowercase();
            if !caption.contains("debt") {
                continue;
            }
            for row in &table.rows {
                let Some(row) = row.as_object() else { continue };
                let name = row
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown Loan");
                let mut properties = HashMap::new();
                for (from, to) in [
                    ("principal", "principal"),
                    ("interest_rate", "rate"),
                    ("maturity_date", "maturity"),
                ] {
                    if let Some(value) = row.get(from) {
                        properties.insert(to.to_string(), value.clone());
                    }
                }
                let mut citation = Citation::page(table.page.unwrap_or(1));
                citation.table_id = table.id.clone();
                entities.push(
                    Entity::new(ids::entity_id(), EntityType::Loan, name, document_id, graph_id)
                        .with_properties(properties)
                        .with_citations(vec![citation]),
                );
            }
        }

        // Summary-only records still yield a summary clause plus simple
        // metrics mined from the text.
        if entities.is_empty() {
            if let Some(summary) = record.summary_text() {
                let mut props = HashMap::new();
                props.insert("text".to_string(), json!(summary));
                entities.push(
                    Entity::new(
                        ids::entity_id(),
                        EntityType::Clause,
                        "Document Summary",
                        document_id,
                        graph_id,
                    )
                    .with_properties(props),
                );
                entities.extend(metrics_from_text(summary, document_id, graph_id));
            }
        }

        entities
    }

    /// Decode one key/value pair from a schema extraction.
    fn entities_from_key_value(
        &self,
        key: &str,
        value: &Value,
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Entity> {
        let mut entities = Vec::new();
        match (key, value) {
            ("company_info", Value::Object(info)) => {
                let Some(name) = info.get("company_name").and_then(Value::as_str) else {
                    return entities;
                };
                let mut props = HashMap::new();
                for field in ["ticker", "report_type", "fiscal_year"] {
                    if let Some(v) = info.get(field) {
                        props.insert(field.to_string(), v.clone());
                    }
                }
                entities.push(
                    Entity::new(ids::entity_id(), EntityType::Company, name, document_id, graph_id)
                        .with_properties(props),
                );
            }
            ("loans", Value::Array(loans)) => {
                for loan_data in loans {
                    let Some(loan_data) = loan_data.as_object() else { continue };
                    let lender = loan_data.get("lender").and_then(Value::as_str);
                    if let Some(lender_name) = lender {
                        entities.push(Entity::new(
                            ids::entity_id(),
                            EntityType::Company,
                            lender_name,
                            document_id,
                            graph_id,
                        ));
                    }
                    let Some(instrument) = loan_data.get("instrument").and_then(Value::as_str)
                    else {
                        continue;
                    };
                    let mut props = HashMap::new();
                    for field in ["lender", "principal", "rate", "maturity", "covenants"] {
                        if let Some(v) = loan_data.get(field) {
                            props.insert(field.to_string(), v.clone());
                        }
                    }
                    entities.push(
                        Entity::new(
                            ids::entity_id(),
                            EntityType::Loan,
                            instrument,
                            document_id,
                            graph_id,
                        )
                        .with_properties(props),
                    );
                }
            }
            ("metrics", Value::Object(metrics)) => {
                for (metric_name, metric_value) in metrics {
                    if metric_value.is_null() {
                        continue;
                    }
                    let mut props = HashMap::new();
                    props.insert("value".to_string(), metric_value.clone());
                    entities.push(
                        Entity::new(
                            ids::entity_id(),
                            EntityType::Metric,
                            metric_name,
                            document_id,
                            graph_id,
                        )
                        .with_properties(props),
                    );
                }
            }
            ("risks", Value::Array(risks)) => {
                for risk in risks {
                    let Some(risk) = risk.as_object() else { continue };
                    let Some(title) = risk.get("risk_title").and_then(Value::as_str) else {
                        continue;
                    };
                    let mut props = HashMap::new();
                    props.insert(
                        "description".to_string(),
                        risk.get("description").cloned().unwrap_or(json!("")),
                    );
                    entities.push(
                        Entity::new(ids::entity_id(), EntityType::Clause, title, document_id, graph_id)
                            .with_properties(props),
                    );
                }
            }
            (_, Value::Array(items)) => {
                entities.extend(generic_array_entities(key, items, document_id, graph_id));
            }
            _ => {}
        }
        entities
    }
}

/// Heuristic processing for adaptive-schema arrays like `cities` or
/// `jurisdictions`: the key name picks the entity type and name field.
fn generic_array_entities(
    key: &str,
    items: &[Value],
    document_id: &str,
    graph_id: &str,
) -> Vec<Entity> {
    if !items.iter().any(Value::is_object) {
        return Vec::new();
    }
    let key_lower = key.to_lowercase();
    let (entity_type, name_field) = if key_lower.contains("cit") || key_lower.contains("jurisdiction")
    {
        (EntityType::Location, "city_name")
    } else if key_lower.contains("compan") {
        (EntityType::Company, "company_name")
    } else if key_lower.contains("loan") {
        (EntityType::Loan, "instrument")
    } else if key_lower.contains("person") || key_lower.contains("people") {
        (EntityType::Person, "name")
    } else {
        (EntityType::Metric, "name")
    };

    let mut entities = Vec::new();
    for item in items {
        let Some(object) = item.as_object() else { continue };
        let name = [name_field, "name", "title", "id", "city"]
            .iter()
            .find_map(|field| object.get(*field).and_then(Value::as_str))
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{key}_{}", &ids::entity_id()["ent_".len()..]));

        let mut entity = Entity::new(ids::entity_id(), entity_type, name, document_id, graph_id)
            .with_properties(flatten_properties(object));
        if let Some(page) = object.get("page").and_then(Value::as_u64) {
            entity.citations.push(Citation::page(page as u32));
        }
        entities.push(entity);
    }
    tracing::info!(key, count = entities.len(), kind = %entity_type, "generic array decoded");
    entities
}

/// Simple metrics mined from free text: percentages and currency amounts
/// with K/M/B scaling.
fn metrics_from_text(text: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let mut metrics = Vec::new();
    for captures in PERCENT_RE.captures_iter(text) {
        let Some(raw) = captures.get(1).map(|m| m.as_str()) else { continue };
        let Ok(value) = raw.parse::<f64>() else { continue };
        let mut props = HashMap::new();
        props.insert("value".to_string(), json!(value));
        props.insert("unit".to_string(), json!("%"));
        metrics.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                format!("percentage_{raw}%"),
                document_id,
                graph_id,
            )
            .with_properties(props),
        );
    }
    for captures in AMOUNT_RE.captures_iter(text) {
        let Some(raw) = captures.get(1).map(|m| m.as_str()) else { continue };
        let Ok(number) = raw.replace(',', "").parse::<f64>() else { continue };
        let suffix = captures
            .get(2)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_default();
        let multiplier = match suffix.as_str() {
            "K" => 1e3,
            "M" => 1e6,
            "B" => 1e9,
            _ => 1.0,
        };
        let mut props = HashMap::new();
        props.insert("value".to_string(), json!(number * multiplier));
        props.insert("unit".to_string(), json!("USD"));
        metrics.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                format!("amount_{raw}{suffix}"),
                document_id,
                graph_id,
            )
            .with_properties(props),
        );
    }
    metrics
}

/// Index the deterministic entity set by name and by city property.
fn build_deterministic_map(entities: &[Entity]) -> HashMap<String, Entity> {
    let mut map = HashMap::new();
    for entity in entities {
        if let Some(city) = entity.string_property("city") {
            map.entry(city).or_insert_with(|| entity.clone());
        }
        map.entry(entity.name.clone())
            .or_insert_with(|| entity.clone());
    }
    map
}

/// Last-resort city-to-county lookup scraped from raw HTML table rows,
/// skipping the first two (header) rows.
fn derive_county_lookup(markdown: &str) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    for row in ROW_RE.captures_iter(markdown).skip(2) {
        let Some(row_html) = row.get(1).map(|m| m.as_str()) else { continue };
        let cells: Vec<String> = CELL_RE
            .captures_iter(row_html)
            .filter_map(|c| c.get(1))
            .map(|m| TAG_RE.replace_all(m.as_str(), "").trim().to_string())
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let (city, county) = (&cells[0], &cells[1]);
        if !city.is_empty() && !county.is_empty() && county.to_lowercase() != "county" {
            lookup.insert(city.clone(), county.clone());
        }
    }
    if !lookup.is_empty() {
        tracing::debug!(cities = lookup.len(), "derived county lookup from markdown");
    }
    lookup
}

/// Fill gaps in the selected entity set from the deterministic set: the
/// `city` property becomes the canonical name, missing counties come from
/// the deterministic entity or the markdown lookup, and any other absent
/// property is copied over.
fn merge_with_deterministic(
    mut entities: Vec<Entity>,
    deterministic_map: &HashMap<String, Entity>,
    county_lookup: &HashMap<String, String>,
) -> Vec<Entity> {
    for entity in &mut entities {
        let city_name = entity
            .string_property("city")
            .or_else(|| entity.string_property("city_name"));
        if let Some(city) = &city_name {
            entity.name = city.clone();
        }

        let det_entity = deterministic_map
            .get(&entity.name)
            .or_else(|| city_name.as_ref().and_then(|c| deterministic_map.get(c)));
        let det_props = det_entity.map(|e| e.properties.clone()).unwrap_or_default();

        let county_missing = entity
            .properties
            .get("county")
            .map_or(true, |v| v.is_null() || v.as_str() == Some(""));
        if county_missing {
            let county_value = det_props
                .get("county")
                .or_else(|| det_props.get("column"))
                .filter(|v| !v.is_null())
                .cloned()
                .or_else(|| {
                    city_name
                        .as_ref()
                        .and_then(|c| county_lookup.get(c))
                        .or_else(|| county_lookup.get(&entity.name))
                        .map(|c| json!(c))
                });
            if let Some(county) = county_value {
                entity.properties.insert("county".to_string(), county);
            }
        }

        for (key, value) in &det_props {
            if key == "column" {
                continue;
            }
            let missing = entity
                .properties
                .get(key)
                .map_or(true, Value::is_null);
            if missing {
                entity.properties.insert(key.clone(), value.clone());
            }
        }
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubModel;
    use ledgergraph::models::{EdgeType, KeyValue};

    fn record_with_cities(count: usize) -> ExtractionRecord {
        let cities: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "city_name": format!("City{i}"),
                    "county": if i < 2 { "Summit" } else { "Other" },
                    "accounts_payable": 1000 * i,
                })
            })
            .collect();
        ExtractionRecord {
            key_values: vec![KeyValue {
                key: "cities".into(),
                value: Value::Array(cities),
            }],
            ..ExtractionRecord::default()
        }
    }

    #[tokio::test]
    async fn large_schema_extraction_is_kept_without_narrative() {
        let model = Arc::new(StubModel::with_responses(vec!["[]".to_string(), "[]".to_string()]));
        let normalizer = Normalizer::new(model);
        let graph = normalizer
            .normalize(&record_with_cities(30), "doc_1")
            .await
            .unwrap();

        assert_eq!(graph.entities.len(), 30);
        assert!(graph
            .entities
            .iter()
            .all(|e| e.entity_type == EntityType::Location));
        // Two entities share county Summit; the heuristic links them.
        assert!(graph.edges.iter().any(|e| {
            e.edge_type == EdgeType::LocatedIn
                && e.properties.get("relationship") == Some(&json!("shared_county"))
        }));
    }

    #[tokio::test]
    async fn sparse_long_document_takes_the_narrative_branch() {
        let narrative_payload = json!({
            "entities": [
                {"name": "Vertex Holdings", "type": "ORGANIZATION", "properties": {}},
                {"name": "Circle", "type": "ORGANIZATION", "properties": {}},
            ],
            "relationships": [
                {"source_name": "Vertex Holdings", "target_name": "Circle",
                 "relationship_type": "PARTNERS_WITH", "reasoning": "stated partnership"}
            ]
        })
        .to_string();
        let model = Arc::new(StubModel::with_responses(vec![narrative_payload]));
        let normalizer = Normalizer::new(model.clone());

        let record = ExtractionRecord {
            markdown: "Narrative prose without tables. ".repeat(400),
            key_values: vec![KeyValue {
                key: "companies".into(),
                value: json!([{"company_name": "Vertex Holdings"},
                              {"company_name": "Circle"}]),
            }],
            ..ExtractionRecord::default()
        };
        assert!(record.markdown.len() > NARRATIVE_MARKDOWN_THRESHOLD);

        let graph = normalizer.normalize(&record, "doc_1").await.unwrap();

        // Narrative entities and their edges are adopted directly; the
        // relationship-detector LLM pass is skipped, so the only model
        // calls are the narrative chunks.
        assert_eq!(graph.entities.len(), 2);
        assert!(graph
            .edges
            .iter()
            .any(|e| e.edge_type == EdgeType::PartnersWith));
        assert!(model.calls() >= 1);
        let narrative_chunks =
            chunk_count(&record.markdown);
        assert_eq!(model.calls(), narrative_chunks);
    }

    fn chunk_count(markdown: &str) -> usize {
        ledgergraph::text::chunk_paragraphs(&ledgergraph::text::strip_html(markdown), 1000)
            .iter()
            .filter(|c| c.trim().len() >= 50)
            .count()
    }

    #[tokio::test]
    async fn summary_only_record_yields_summary_and_metrics() {
        let model = Arc::new(StubModel::with_responses(vec!["[]".to_string()]));
        let normalizer = Normalizer::new(model);
        let record = ExtractionRecord {
            key_values: vec![KeyValue {
                key: "summary".into(),
                value: json!("Revenue grew 8% to $50M while costs fell."),
            }],
            ..ExtractionRecord::default()
        };
        let graph = normalizer.normalize(&record, "doc_1").await.unwrap();

        assert!(graph.entities.iter().any(|e| e.name == "Document Summary"));
        assert!(graph
            .entities
            .iter()
            .any(|e| e.name == "percentage_8%" && e.properties["value"] == json!(8.0)));
        let amount = graph
            .entities
            .iter()
            .find(|e| e.name == "amount_50M")
            .unwrap();
        assert_eq!(amount.properties["value"], json!(50_000_000.0));
    }

    #[tokio::test]
    async fn county_merges_from_markdown_lookup() {
        let model = Arc::new(StubModel::with_responses(vec!["[]".to_string()]));
        let normalizer = Normalizer::new(model);
        // Schema extraction knows the city but not the county; the raw
        // markdown table has it.
        let markdown = "<table>\
            <tr><td>Municipal Data</td></tr>\
            <tr><th>City</th><th>County</th></tr>\
            <tr><td>Akron</td><td>Summit</td></tr>\
            </table>";
        let mut record = record_with_cities(0);
        record.markdown = markdown.to_string();
        record.key_values = vec![KeyValue {
            key: "cities".into(),
            value: json!([{"city_name": "Akron", "accounts_payable": 5}]),
        }];

        let graph = normalizer.normalize(&record, "doc_1").await.unwrap();
        let akron = graph.entities.iter().find(|e| e.name == "Akron").unwrap();
        assert_eq!(akron.properties["county"], "Summit");
    }

    #[test]
    fn nested_properties_flatten() {
        let mut raw = Map::new();
        raw.insert("principal".into(), json!(1000));
        raw.insert("terms".into(), json!({"rate": 0.09, "maturity": "2030"}));
        raw.insert("tags".into(), json!(["a", "b"]));
        let flat = flatten_properties(&raw);
        assert_eq!(flat["principal"], json!(1000));
        assert_eq!(flat["terms_rate"], json!(0.09));
        assert_eq!(flat["terms_maturity"], json!("2030"));
        assert!(flat["tags"].is_string());
    }

    #[test]
    fn entity_type_mapping_covers_the_source_labels() {
        assert_eq!(map_entity_type("ORGANIZATION"), Some(EntityType::Company));
        assert_eq!(map_entity_type("DEBT"), Some(EntityType::Loan));
        assert_eq!(map_entity_type("other"), Some(EntityType::Clause));
        assert_eq!(map_entity_type("MYSTERY"), None);
    }
}
