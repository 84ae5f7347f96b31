//! The tool-calling chat loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use ledgergraph::Result;
use ledgergraph_bedrock::{
    CompletionModel, CompletionRequest, ContentBlock, ConversationTurn, TurnRole,
};
use ledgergraph_graph::AnalyticsEngine;
use ledgergraph_index::{Indexer, TraverseDirection};
use serde_json::{json, Value};

use crate::filters::{filter_by_properties, normalize_property_filters};
use crate::tools::{tool_definitions, ToolName};

/// At most this many LLM rounds per user message; each round may execute
/// one tool.
const MAX_TOOL_ROUNDS: usize = 4;
const EVIDENCE_MAX_ENTITIES: usize = 5;

/// Context the caller supplies with a chat message: graph/document scope
/// and optional precomputed entity snapshots.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub graph_id: Option<String>,
    pub document_id: Option<String>,
    pub document_ids: Vec<String>,
    /// Entity snapshots (`{id, name, type, properties}`) already loaded by
    /// the caller.
    pub entities: Vec<Value>,
    pub total_entities: usize,
    pub total_documents: usize,
}

/// The conversational agent: system prompt composition, tool dispatch,
/// model fallback and streaming output.
pub struct ChatAgent {
    model: Arc<dyn CompletionModel>,
    indexer: Indexer,
    analytics: Arc<AnalyticsEngine>,
    api_prefix: String,
}

impl ChatAgent {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        indexer: Indexer,
        analytics: Arc<AnalyticsEngine>,
        api_prefix: impl Into<String>,
    ) -> Self {
        Self {
            model,
            indexer,
            analytics,
            api_prefix: api_prefix.into(),
        }
    }

    /// Answer a message, yielding response text chunks. Tool calls execute
    /// against local state and the stores; the conversation is re-issued
    /// with each tool result until the model answers in text.
    pub fn chat(
        self: Arc<Self>,
        message: String,
        context: ChatContext,
    ) -> impl Stream<Item = Result<String>> {
        stream! {
            let system_prompt = self.system_prompt(&context);
            let mut turns = vec![ConversationTurn::user(message)];

            for round in 0..MAX_TOOL_ROUNDS {
                let request = CompletionRequest {
                    system: Some(system_prompt.clone()),
                    messages: turns.clone(),
                    tools: tool_definitions(),
                    max_tokens: 4096,
                    temperature: 0.7,
                };
                let completion = match self.model.complete(request).await {
                    Ok(completion) => completion,
                    Err(err) => {
                        tracing::error!(error = %err, "chat completion failed");
                        yield Err(err);
                        return;
                    }
                };

                let mut tool_call: Option<(String, String, Value)> = None;
                for block in &completion.content {
                    match block {
                        ContentBlock::Text(text) => {
                            if !text.is_empty() {
                                yield Ok(text.clone());
                            }
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_call = Some((id.clone(), name.clone(), input.clone()));
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }

                let Some((tool_use_id, tool_name, tool_input)) = tool_call else {
                    return;
                };
                tracing::info!(tool = %tool_name, round, "executing tool");
                let result = self.execute_tool(&tool_name, &tool_input, &context).await;
                turns.push(ConversationTurn {
                    role: TurnRole::Assistant,
                    content: completion.content.clone(),
                });
                turns.push(ConversationTurn::tool_result(
                    tool_use_id,
                    result.to_string(),
                ));
            }
            tracing::warn!("tool round budget exhausted");
        }
    }

    fn system_prompt(&self, context: &ChatContext) -> String {
        let mut entities_context = String::new();
        if !context.entities.is_empty() {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for entity in &context.entities {
                *counts
                    .entry(entity["type"].as_str().unwrap_or("UNKNOWN"))
                    .or_default() += 1;
            }
            entities_context.push_str("\n\nCurrent Knowledge Graph Context:\n");
            entities_context.push_str(&format!(
                "- Total entities: {}\n- Total documents: {}\n",
                context.total_entities, context.total_documents
            ));
            let mut types: Vec<_> = counts.into_iter().collect();
            types.sort_unstable();
            for (entity_type, count) in types {
                entities_context.push_str(&format!("- {entity_type}: {count}\n"));
            }
            entities_context.push_str("\nKey Entities Available:\n");
            for entity in context.entities.iter().take(10) {
                entities_context.push_str(&format!(
                    "- {} ({})\n",
                    entity["name"].as_str().unwrap_or("?"),
                    entity["type"].as_str().unwrap_or("?")
                ));
            }
        }

        format!(
            r#"You are a financial investigation assistant.

Your role is to help analysts understand complex financial documents by:
- Analyzing cities, companies, loans, and financial data from uploaded documents
- Providing evidence-backed insights with specific references to organizations and amounts
- Detecting risks and anomalies
- Explaining findings in clear, natural language that business users can understand
{entities_context}
TOOL USAGE GUIDE:

1. graph_query: use for finding entities by name, type, or properties.
   - ALWAYS set entity_types when the user asks about entities.
   - Entity type mappings: "cities"/"city" -> ["Location"]; "companies"/"company" -> ["Company"];
     "loans"/"loan" -> ["Loan"]; "invoices"/"invoice" -> ["Invoice"]; "locations" -> ["Location"].
   - Property filter operators: $gt (over, above, more than), $lt (under, below),
     $gte (at least), $lte (at most), $eq (exactly).
   - Example: "Which cities have accounts payable over $500,000?" ->
     entity_types: ["Location"], property_filters: {{"accounts_payable": {{"$gt": 500000}}}}.

2. graph_traverse: use for finding connected entities.
3. graph_path: use for finding how two entities are connected.
4. document_search: use for searching document text content.
5. metric_compute: use for analytics that combine, compare, or aggregate multiple properties
   (property_threshold, property_comparison, grouped_aggregation, sequential_drop,
   liquidity_analysis, debt_risk, loan_maturity). Include graph_id in params when available.

IMPORTANT INSTRUCTIONS:
- When you receive tool results, use them to answer the question.
- If a tool returns 0 results, say so naturally and suggest a next step.
- Extract property names from the question using exact field names:
  "cash" or "cash balance" -> "cash_and_cash_equivalents"; "accounts payable" -> "accounts_payable";
  "total assets" -> "total_assets".
- Provide specific organization names, dollar amounts, and percentages from the results.
- Always cite the document and page when you use evidence.
- Never expose internal machinery to the user: no tool names, store names, graph ids,
  or other implementation vocabulary. Speak like a financial analyst, not a software engineer."#
        )
    }

    async fn execute_tool(&self, name: &str, input: &Value, context: &ChatContext) -> Value {
        match ToolName::parse(name) {
            Some(ToolName::GraphQuery) => self.tool_graph_query(input, context).await,
            Some(ToolName::DocLookup) => {
                let document_id = input["document_id"].as_str().unwrap_or_default();
                let page = input["page"].as_u64();
                json!({
                    "document_id": document_id,
                    "page": page,
                    "url": match page {
                        Some(page) => format!("{}/evidence/{document_id}?page={page}", self.api_prefix),
                        None => format!("{}/evidence/{document_id}", self.api_prefix),
                    },
                })
            }
            Some(ToolName::DocumentSearch) => {
                let query = input["query"].as_str().unwrap_or_default();
                let limit = input["limit"].as_u64().unwrap_or(5) as usize;
                let chunks = self.indexer.search_chunks(query, limit).await;
                json!({
                    "query": query,
                    "count": chunks.len(),
                    "chunks": chunks.iter().map(|c| json!({
                        "chunk_id": c.chunk_id,
                        "document_id": c.document_id,
                        "content": c.content,
                        "page_number": c.page_number,
                        "filename": c.filename,
                        "entity_refs": c.entity_refs,
                        "score": c.score,
                    })).collect::<Vec<_>>(),
                })
            }
            Some(ToolName::MetricCompute) => {
                let metric_name = input["metric_name"].as_str().unwrap_or_default();
                let params = input.get("params").cloned().unwrap_or_else(|| json!({}));
                let mut result = self
                    .analytics
                    .compute_metric(metric_name, &params, context.graph_id.as_deref())
                    .await;
                if let Some(object) = result.as_object_mut() {
                    object
                        .entry("metric_name")
                        .or_insert_with(|| json!(metric_name));
                }
                result
            }
            Some(ToolName::GraphTraverse) => self.tool_graph_traverse(input).await,
            Some(ToolName::GraphPath) => self.tool_graph_path(input).await,
            Some(ToolName::GraphPattern) => self.tool_graph_pattern(input).await,
            None => json!({"error": format!("Unknown tool: {name}")}),
        }
    }

    async fn tool_graph_query(&self, input: &Value, context: &ChatContext) -> Value {
        let query_text = input["query_text"].as_str().unwrap_or_default();
        let limit = input["limit"].as_u64().unwrap_or(50) as usize;
        let entity_types = normalize_entity_types(
            input["entity_types"]
                .as_array()
                .map(|types| {
                    types
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            query_text,
        );

        let raw_filters = input["property_filters"]
            .as_object()
            .cloned()
            .unwrap_or_default();
        let property_filters =
            normalize_property_filters(&raw_filters, &self.known_property_keys(context).await);

        let mut combined: Vec<Value> = Vec::new();
        let mut sources: Vec<&str> = Vec::new();

        // Graph store first: precise property-based lookup.
        if let Some(graph) = self.indexer.graph_store() {
            match graph
                .entities_filtered(&entity_types, context.graph_id.as_deref(), limit * 2)
                .await
            {
                Ok(records) => {
                    if !records.is_empty() {
                        sources.push("graph_store");
                    }
                    combined.extend(records.into_iter().map(|r| {
                        json!({
                            "id": r.id,
                            "name": r.name,
                            "type": r.entity_type,
                            "properties": r.properties,
                        })
                    }));
                }
                Err(err) => tracing::warn!(error = %err, "graph store query failed"),
            }
        }

        // Vector store for semantic matches; type filters re-apply.
        let semantic = self.indexer.search_entities(query_text, limit).await;
        if !semantic.is_empty() {
            sources.push("vector_store");
        }
        combined.extend(semantic.into_iter().filter_map(|hit| {
            if !entity_types.is_empty()
                && !entity_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(&hit.entity_type))
            {
                return None;
            }
            Some(json!({
                "id": hit.id,
                "name": hit.name,
                "type": hit.entity_type,
                "properties": hit.properties,
                "citations": hit.citations,
            }))
        }));

        // Context snapshots as a last resort.
        if combined.is_empty() && !context.entities.is_empty() {
            let query_lower = query_text.to_lowercase();
            combined.extend(
                context
                    .entities
                    .iter()
                    .filter(|entity| {
                        entity["name"]
                            .as_str()
                            .map(|n| n.to_lowercase().contains(&query_lower))
                            .unwrap_or(false)
                            || entity["properties"].to_string().to_lowercase().contains(&query_lower)
                    })
                    .cloned(),
            );
            if !combined.is_empty() {
                sources.push("context");
            }
        }

        // Dedupe by id (name as a fallback key), re-apply property
        // filters, then truncate.
        let mut seen: HashSet<String> = HashSet::new();
        let deduped: Vec<Value> = combined
            .into_iter()
            .filter(|entity| {
                let key = entity["id"]
                    .as_str()
                    .map(|id| format!("id:{id}"))
                    .unwrap_or_else(|| {
                        format!("name:{}", entity["name"].as_str().unwrap_or("").to_lowercase())
                    });
                seen.insert(key)
            })
            .collect();
        let mut results = filter_by_properties(deduped, &property_filters);
        results.truncate(limit);

        let evidence = self.markdown_evidence(&results).await;
        json!({
            "results": results,
            "count": results.len(),
            "query": query_text,
            "source": sources.join("+"),
            "graph_id": context.graph_id,
            "evidence": evidence,
        })
    }

    /// Property keys visible in context snapshots, else sampled from the
    /// graph store.
    async fn known_property_keys(&self, context: &ChatContext) -> HashSet<String> {
        let mut keys: HashSet<String> = context
            .entities
            .iter()
            .filter_map(|entity| entity["properties"].as_object())
            .flat_map(|props| props.keys().cloned())
            .collect();
        if keys.is_empty() {
            if let (Some(graph), Some(graph_id)) =
                (self.indexer.graph_store(), context.graph_id.as_deref())
            {
                if let Ok(sampled) = graph.sample_property_keys(graph_id, 20).await {
                    keys.extend(sampled);
                }
            }
        }
        keys
    }

    /// Supporting markdown snippets for the first few result entities.
    async fn markdown_evidence(&self, results: &[Value]) -> Vec<Value> {
        let mut evidence = Vec::new();
        for entity in results.iter().take(EVIDENCE_MAX_ENTITIES) {
            let Some(name) = entity["name"].as_str().filter(|n| !n.is_empty()) else {
                continue;
            };
            for chunk in self.indexer.search_chunks(name, 1).await {
                evidence.push(json!({
                    "entity_id": entity["id"],
                    "entity_name": name,
                    "snippet": chunk.content,
                    "page_number": chunk.page_number,
                    "document_id": chunk.document_id,
                    "score": chunk.score,
                }));
            }
        }
        evidence
    }

    async fn tool_graph_traverse(&self, input: &Value) -> Value {
        let Some(graph) = self.indexer.graph_store() else {
            return json!({"error": "Graph store not available", "results": []});
        };
        let entity_name = input["entity_name"].as_str().unwrap_or_default();
        let relationship_type = input["relationship_type"].as_str().filter(|t| *t != "any");
        let direction = TraverseDirection::parse(input["direction"].as_str().unwrap_or("both"));
        let depth = input["depth"].as_u64().unwrap_or(1) as u32;

        match graph
            .traverse(entity_name, relationship_type, direction, depth)
            .await
        {
            Ok(connected) => json!({
                "starting_entity": entity_name,
                "count": connected.len(),
                "connected_entities": connected.iter().map(|c| json!({
                    "id": c.record.id,
                    "name": c.record.name,
                    "type": c.record.entity_type,
                    "properties": c.record.properties,
                    "relationship_path": c.relationship_path,
                    "distance": c.distance,
                })).collect::<Vec<_>>(),
            }),
            Err(err) => json!({"error": err.to_string(), "results": []}),
        }
    }

    async fn tool_graph_path(&self, input: &Value) -> Value {
        let Some(graph) = self.indexer.graph_store() else {
            return json!({"error": "Graph store not available", "path_found": false});
        };
        let from_entity = input["from_entity"].as_str().unwrap_or_default();
        let to_entity = input["to_entity"].as_str().unwrap_or_default();
        let max_depth = input["max_depth"].as_u64().unwrap_or(5) as u32;

        // Existence pre-check gives a clearer answer than an empty path.
        let mut missing = Vec::new();
        for name in [from_entity, to_entity] {
            match graph.entity_exists(name).await {
                Ok(false) => missing.push(name),
                Ok(true) => {}
                Err(err) => return json!({"error": err.to_string(), "path_found": false}),
            }
        }
        if !missing.is_empty() {
            return json!({
                "from": from_entity,
                "to": to_entity,
                "path_found": false,
                "missing_entities": missing,
                "message": "Entities not present in knowledge graph",
            });
        }

        match graph.shortest_path(from_entity, to_entity, max_depth).await {
            Ok(Some(path)) => json!({
                "from": from_entity,
                "to": to_entity,
                "path_found": true,
                "path_length": path.length,
                "nodes": path.entity_ids.iter().zip(&path.entity_names).zip(&path.entity_types)
                    .map(|((id, name), entity_type)| json!({"id": id, "name": name, "type": entity_type}))
                    .collect::<Vec<_>>(),
                "relationships": path.relationship_types,
            }),
            Ok(None) => json!({
                "from": from_entity,
                "to": to_entity,
                "path_found": false,
                "missing_entities": [],
                "message": format!("No path found between '{from_entity}' and '{to_entity}' within {max_depth} hops"),
            }),
            Err(err) => json!({"error": err.to_string(), "path_found": false}),
        }
    }

    async fn tool_graph_pattern(&self, input: &Value) -> Value {
        let Some(graph) = self.indexer.graph_store() else {
            return json!({"error": "Graph store not available", "results": []});
        };
        let pattern = input["pattern_description"].as_str().unwrap_or_default();
        let entity_type = input["entity_type"].as_str().filter(|t| !t.is_empty());
        let min_connections = input["min_connections"].as_i64().unwrap_or(1);

        match graph
            .entities_with_min_connections(entity_type, min_connections)
            .await
        {
            Ok(matches) => json!({
                "pattern": pattern,
                "entity_type": entity_type.unwrap_or("any"),
                "min_connections": min_connections,
                "count": matches.len(),
                "matches": matches.iter().map(|m| json!({
                    "id": m.record.id,
                    "name": m.record.name,
                    "type": m.record.entity_type,
                    "properties": m.record.properties,
                    "relationship_count": m.relationship_count,
                    "connected_to": m.connected_to,
                })).collect::<Vec<_>>(),
            }),
            Err(err) => json!({"error": err.to_string(), "results": []}),
        }
    }
}

/// Map friendly entity type names onto the closed set, inferring from the
/// query text when no types were supplied.
fn normalize_entity_types(entity_types: Vec<String>, query_text: &str) -> Vec<String> {
    let mapped: Vec<String> = entity_types
        .iter()
        .filter_map(|raw| map_entity_type_name(raw))
        .collect();
    if !mapped.is_empty() {
        return dedup_preserving_order(mapped);
    }

    let query_lower = query_text.to_lowercase();
    for (needle, canonical) in [
        ("cit", "Location"),
        ("compan", "Company"),
        ("loan", "Loan"),
        ("invoice", "Invoice"),
    ] {
        if query_lower.contains(needle) {
            return vec![canonical.to_string()];
        }
    }
    Vec::new()
}

fn map_entity_type_name(raw: &str) -> Option<String> {
    let canonical = match raw.to_lowercase().as_str() {
        "city" | "cities" | "location" | "locations" => "Location",
        "company" | "companies" => "Company",
        "loan" | "loans" => "Loan",
        "invoice" | "invoices" => "Invoice",
        "metric" | "metrics" => "Metric",
        "person" | "people" => "Person",
        "vendor" | "vendors" => "Vendor",
        "clause" | "clauses" => "Clause",
        "subsidiary" | "subsidiaries" => "Subsidiary",
        "instrument" | "instruments" => "Instrument",
        _ => return None,
    };
    Some(canonical.to_string())
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use ledgergraph::models::{Edge, Entity};
    use ledgergraph_index::{
        ConnectedEntity, EntityRecord, GraphPath, GraphStore, PatternMatch,
    };
    use std::sync::Mutex;

    struct ScriptedModel {
        completions: Mutex<Vec<ledgergraph_bedrock::Completion>>,
    }

    impl ScriptedModel {
        fn new(completions: Vec<ledgergraph_bedrock::Completion>) -> Self {
            Self {
                completions: Mutex::new(completions),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<ledgergraph_bedrock::Completion> {
            let mut completions = self.completions.lock().unwrap();
            if completions.is_empty() {
                return Err(ledgergraph::Error::network("script exhausted"));
            }
            Ok(completions.remove(0))
        }
    }

    struct CityGraphStore;

    #[async_trait]
    impl GraphStore for CityGraphStore {
        async fn upsert_entities(&self, _e: &[Entity]) -> Result<usize> {
            Ok(0)
        }
        async fn create_edges(&self, _e: &[Edge]) -> Result<usize> {
            Ok(0)
        }
        async fn entities_by_type(
            &self,
            _t: &str,
            _g: Option<&str>,
            _l: usize,
        ) -> Result<Vec<EntityRecord>> {
            Ok(Vec::new())
        }
        async fn entities_filtered(
            &self,
            entity_types: &[String],
            _graph_id: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<EntityRecord>> {
            assert_eq!(entity_types, &["Location".to_string()]);
            Ok(vec![
                EntityRecord {
                    id: "ent_akron".into(),
                    name: "Akron".into(),
                    entity_type: "Location".into(),
                    properties: [("accounts_payable".to_string(), json!(600_000))]
                        .into_iter()
                        .collect(),
                    graph_id: Some("graph_1".into()),
                },
                EntityRecord {
                    id: "ent_canton".into(),
                    name: "Canton".into(),
                    entity_type: "Location".into(),
                    properties: [("accounts_payable".to_string(), json!(100_000))]
                        .into_iter()
                        .collect(),
                    graph_id: Some("graph_1".into()),
                },
            ])
        }
        async fn entity_exists(&self, _n: &str) -> Result<bool> {
            Ok(true)
        }
        async fn traverse(
            &self,
            _n: &str,
            _r: Option<&str>,
            _d: TraverseDirection,
            _depth: u32,
        ) -> Result<Vec<ConnectedEntity>> {
            Ok(Vec::new())
        }
        async fn shortest_path(
            &self,
            _f: &str,
            _t: &str,
            _m: u32,
        ) -> Result<Option<GraphPath>> {
            Ok(None)
        }
        async fn entities_with_min_connections(
            &self,
            _t: Option<&str>,
            _m: i64,
        ) -> Result<Vec<PatternMatch>> {
            Ok(Vec::new())
        }
        async fn sample_property_keys(&self, _g: &str, _l: usize) -> Result<Vec<String>> {
            Ok(vec!["accounts_payable".into()])
        }
    }

    fn agent_with(model: ScriptedModel) -> Arc<ChatAgent> {
        let graph: Arc<dyn GraphStore> = Arc::new(CityGraphStore);
        let indexer = Indexer::new(None, Some(graph.clone()));
        let analytics = Arc::new(AnalyticsEngine::new(Some(graph)));
        Arc::new(ChatAgent::new(
            Arc::new(model),
            indexer,
            analytics,
            "/api/v1",
        ))
    }

    #[tokio::test]
    async fn graph_query_tool_round_trips_to_final_answer() {
        let tool_turn = ledgergraph_bedrock::Completion {
            content: vec![ContentBlock::ToolUse {
                id: "tu_1".into(),
                name: "graph_query".into(),
                input: json!({
                    "query_text": "cities with accounts payable over 500000",
                    "entity_types": ["Location"],
                    "property_filters": {"accounts_payable": {"$gt": 500_000}},
                }),
            }],
            stop_reason: Some("tool_use".into()),
        };
        let final_turn = ledgergraph_bedrock::Completion {
            content: vec![ContentBlock::Text(
                "Akron has accounts payable of $600,000.".into(),
            )],
            stop_reason: Some("end_turn".into()),
        };
        let agent = agent_with(ScriptedModel::new(vec![tool_turn, final_turn]));

        let context = ChatContext {
            graph_id: Some("graph_1".into()),
            ..ChatContext::default()
        };
        let chunks: Vec<String> = agent
            .chat("Which cities have accounts_payable over 500000?".into(), context)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks, vec!["Akron has accounts payable of $600,000.".to_string()]);
    }

    #[tokio::test]
    async fn tool_result_contains_only_filtered_entities() {
        let agent = agent_with(ScriptedModel::new(Vec::new()));
        let context = ChatContext {
            graph_id: Some("graph_1".into()),
            ..ChatContext::default()
        };
        let result = agent
            .execute_tool(
                "graph_query",
                &json!({
                    "query_text": "cities with accounts payable over 500000",
                    "entity_types": ["cities"],
                    "property_filters": {"accounts payable": {"$gt": 500_000}},
                }),
                &context,
            )
            .await;

        assert_eq!(result["count"], 1);
        assert_eq!(result["results"][0]["name"], "Akron");
        assert_eq!(result["source"], "graph_store");
    }

    #[tokio::test]
    async fn unknown_tool_reports_error() {
        let agent = agent_with(ScriptedModel::new(Vec::new()));
        let result = agent
            .execute_tool("time_travel", &json!({}), &ChatContext::default())
            .await;
        assert!(result["error"].as_str().unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn doc_lookup_synthesizes_evidence_url() {
        let agent = agent_with(ScriptedModel::new(Vec::new()));
        let result = agent
            .execute_tool(
                "doc_lookup",
                &json!({"document_id": "doc_9", "page": 5}),
                &ChatContext::default(),
            )
            .await;
        assert_eq!(result["url"], "/api/v1/evidence/doc_9?page=5");
    }

    #[test]
    fn entity_type_inference_from_query_text() {
        assert_eq!(
            normalize_entity_types(Vec::new(), "show me all cities"),
            vec!["Location".to_string()]
        );
        assert_eq!(
            normalize_entity_types(vec!["companies".into()], "whatever"),
            vec!["Company".to_string()]
        );
        assert!(normalize_entity_types(Vec::new(), "hello there").is_empty());
    }
}
