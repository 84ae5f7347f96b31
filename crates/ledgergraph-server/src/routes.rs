//! Route table and handlers.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use ledgergraph::models::ChatRole;
use ledgergraph::Error;
use ledgergraph_agent::ChatContext;
use ledgergraph_graph::RiskDetector;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::state::AppContext;

/// Error envelope: every failure becomes a structured JSON body.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Network(_) | Error::Api { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the full router under the configured prefix.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            ctx.config
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse::<axum::http::HeaderValue>().ok()),
        ))
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/ingest", post(ingest))
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/documents/:id/pdf", get(serve_blob))
        .route("/extract", post(run_extract))
        .route("/extract/status", get(extract_status))
        .route("/extract/stream", get(extract_stream))
        .route("/extract/jobs", get(list_jobs))
        .route("/extract/jobs/:id", get(get_job))
        .route("/extract/jobs/:id/result", get(get_job_result))
        .route("/normalize", post(run_normalize))
        .route("/index", post(run_index))
        .route("/risk", post(run_risk))
        .route("/risks", get(list_risks))
        .route("/risks/graph/:id", get(risks_for_graph))
        .route("/risks/document/:id", get(risks_for_document))
        .route("/risks/analyze/:graph_id", post(run_risk_for_graph))
        .route("/risks/:id/graph", get(risk_subgraph))
        .route("/graph/:id", get(get_graph))
        .route("/graph/query", post(graph_query))
        .route("/entities", get(list_entities))
        .route("/entities/graph/:id", get(entities_for_graph))
        .route("/entities/search", post(search_entities))
        .route("/entities/:id", get(get_entity))
        .route("/relationships", get(list_relationships))
        .route("/relationships/graph/:id", get(relationships_for_graph))
        .route("/analytics/dashboard", get(analytics_dashboard))
        .route("/analytics/risk-trends", get(analytics_risk_trends))
        .route("/chat/sessions", get(list_sessions).post(create_session))
        .route(
            "/chat/sessions/:id",
            get(get_session).put(rename_session).delete(delete_session),
        )
        .route(
            "/chat/sessions/:id/messages",
            get(list_messages).post(post_message),
        )
        .route(
            "/chat/sessions/:id/documents/:doc_id",
            put(attach_document).delete(detach_document),
        )
        .route("/ask", post(ask));

    Router::new()
        .nest(&ctx.config.api_prefix, api)
        .route("/health", get(health))
        .layer(cors)
        .with_state(ctx)
}

async fn health(State(ctx): State<AppContext>) -> Json<Value> {
    Json(json!({
        "name": ctx.config.app_name,
        "version": ctx.config.app_version,
        "status": "ok",
    }))
}

// ---- documents ----

async fn ingest(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("unreadable multipart body: {e}")))?
    {
        if field.name() != Some("file") && field.name() != Some("document") {
            continue;
        }
        let filename = field
            .file_name()
            .map(ToString::to_string)
            .unwrap_or_else(|| "upload.bin".to_string());
        let mime_type = field
            .content_type()
            .map(ToString::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let content = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("unreadable upload: {e}")))?;
        let document = ctx
            .coordinator
            .ingest(&content, &filename, &mime_type)
            .await?;
        return Ok(Json(serde_json::to_value(document).map_err(Error::from)?));
    }
    Err(Error::validation("multipart body carried no file field").into())
}

async fn list_documents(State(ctx): State<AppContext>) -> Json<Value> {
    ctx.state.prune_missing_blobs();
    let documents: Vec<Value> = ctx
        .state
        .list_documents()
        .iter()
        .map(|d| {
            // Listing omits the bulky extraction payload.
            let mut value = serde_json::to_value(d).unwrap_or_default();
            if let Some(object) = value.as_object_mut() {
                object.remove("extraction");
            }
            value
        })
        .collect();
    Json(json!({"documents": documents, "count": documents.len()}))
}

async fn get_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let document = ctx
        .state
        .document(&id)
        .ok_or_else(|| Error::not_found(format!("document {id}")))?;
    Ok(Json(serde_json::to_value(document).map_err(Error::from)?))
}

async fn delete_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ctx.coordinator.delete_document(&id).await?;
    Ok(Json(json!({"deleted": id})))
}

async fn serve_blob(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let document = ctx
        .state
        .document(&id)
        .ok_or_else(|| Error::not_found(format!("document {id}")))?;
    let bytes = tokio::fs::read(&document.file_path)
        .await
        .map_err(|_| Error::not_found(format!("blob for document {id}")))?;
    Ok((
        [(header::CONTENT_TYPE, document.mime_type.clone())],
        bytes,
    )
        .into_response())
}

// ---- pipeline stages ----

#[derive(Deserialize)]
struct DocumentIdQuery {
    document_id: String,
}

async fn run_extract(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentIdQuery>,
) -> ApiResult<Json<Value>> {
    let outcome = ctx.coordinator.extract(&query.document_id).await?;
    let document = ctx.state.document(&query.document_id);
    Ok(Json(json!({
        "document_id": outcome.document_id,
        "extraction_id": outcome.artifact_id,
        "cached": outcome.cached,
        "entities_count": document
            .as_ref()
            .and_then(|d| d.extraction.as_ref())
            .map_or(0, |e| e.entities.len()),
        "ade_output": document.and_then(|d| d.extraction),
    })))
}

async fn extract_status(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentIdQuery>,
) -> Json<Value> {
    let progress = ctx.coordinator.progress().get(&query.document_id);
    Json(json!({"document_id": query.document_id, "progress": progress}))
}

/// Server-sent progress: one `data: <json>` frame per change, terminating
/// once the record reaches a terminal status.
async fn extract_stream(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentIdQuery>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let document_id = query.document_id;
    let tracker = ctx.coordinator.progress().clone();
    let stream = async_stream::stream! {
        let mut changes = tracker.subscribe();
        let current = tracker.get(&document_id);
        yield Ok(Event::default().data(serde_json::to_string(&current).unwrap_or_default()));
        if current.is_terminal() {
            return;
        }
        while let Ok((changed_id, progress)) = changes.recv().await {
            if changed_id != document_id {
                continue;
            }
            yield Ok(Event::default().data(serde_json::to_string(&progress).unwrap_or_default()));
            if progress.is_terminal() {
                return;
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn list_jobs(State(ctx): State<AppContext>) -> Json<Value> {
    let jobs: Vec<Value> = ctx
        .state
        .jobs
        .read()
        .values()
        .map(|j| serde_json::to_value(j).unwrap_or_default())
        .collect();
    Json(json!({"jobs": jobs, "count": jobs.len()}))
}

async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job = ctx
        .state
        .jobs
        .read()
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::not_found(format!("job {id}")))?;
    Ok(Json(serde_json::to_value(job).map_err(Error::from)?))
}

async fn get_job_result(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let result_path = ctx
        .state
        .jobs
        .read()
        .get(&id)
        .and_then(|j| j.result_path.clone())
        .ok_or_else(|| Error::not_found(format!("result for job {id}")))?;
    let raw = tokio::fs::read(&result_path)
        .await
        .map_err(|_| Error::not_found(format!("result file for job {id}")))?;
    Ok(Json(serde_json::from_slice(&raw).map_err(Error::from)?))
}

async fn run_normalize(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentIdQuery>,
) -> ApiResult<Json<Value>> {
    let outcome = ctx.coordinator.normalize(&query.document_id).await?;
    Ok(Json(json!({
        "document_id": outcome.document_id,
        "graph_id": outcome.artifact_id,
        "entities_count": outcome.entities_count,
        "edges_count": outcome.edges_count,
    })))
}

#[derive(Deserialize)]
struct IndexQuery {
    graph_id: Option<String>,
    document_id: Option<String>,
}

async fn run_index(
    State(ctx): State<AppContext>,
    Query(query): Query<IndexQuery>,
) -> ApiResult<Json<Value>> {
    let document_id = match (query.document_id, query.graph_id) {
        (Some(document_id), _) => document_id,
        (None, Some(graph_id)) => ctx
            .state
            .graph(&graph_id)
            .map(|g| g.document_id)
            .ok_or_else(|| Error::not_found(format!("graph {graph_id}")))?,
        (None, None) => {
            return Err(Error::validation("graph_id or document_id is required").into())
        }
    };
    let outcome = ctx.coordinator.index(&document_id).await?;
    Ok(Json(json!({
        "document_id": outcome.document_id,
        "graph_id": outcome.artifact_id,
        "entities_count": outcome.entities_count,
        "edges_count": outcome.edges_count,
        "cached": outcome.cached,
    })))
}

// ---- risks ----

#[derive(Deserialize)]
struct GraphIdQuery {
    graph_id: String,
}

async fn run_risk(
    State(ctx): State<AppContext>,
    Query(query): Query<GraphIdQuery>,
) -> ApiResult<Json<Value>> {
    let risks = ctx.coordinator.detect_risks(&query.graph_id).await?;
    Ok(Json(json!({
        "graph_id": query.graph_id,
        "count": risks.len(),
        "risks": risks,
        "summary": RiskDetector::risk_summary(&risks),
    })))
}

async fn run_risk_for_graph(
    State(ctx): State<AppContext>,
    Path(graph_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let risks = ctx.coordinator.detect_risks(&graph_id).await?;
    Ok(Json(json!({"graph_id": graph_id, "count": risks.len(), "risks": risks})))
}

async fn list_risks(State(ctx): State<AppContext>) -> Json<Value> {
    let risks = ctx.state.all_risks();
    Json(json!({
        "count": risks.len(),
        "summary": RiskDetector::risk_summary(&risks),
        "risks": risks,
    }))
}

async fn risks_for_graph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<Value> {
    let risks = ctx.state.graph_risks(&id);
    Json(json!({"graph_id": id, "count": risks.len(), "risks": risks}))
}

async fn risks_for_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<Value> {
    let risks: Vec<_> = ctx
        .state
        .all_risks()
        .into_iter()
        .filter(|r| r.document_id == id)
        .collect();
    Json(json!({"document_id": id, "count": risks.len(), "risks": risks}))
}

async fn risk_subgraph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let risk = ctx
        .state
        .all_risks()
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::not_found(format!("risk {id}")))?;
    Ok(Json(json!({
        "risk_id": id,
        "graph_data": risk.graph_data,
    })))
}

// ---- graph reads ----

async fn get_graph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let graph = ctx
        .state
        .graph(&id)
        .ok_or_else(|| Error::not_found(format!("graph {id}")))?;
    Ok(Json(serde_json::to_value(graph).map_err(Error::from)?))
}

#[derive(Deserialize)]
struct GraphQueryBody {
    #[serde(default)]
    query_text: String,
    #[serde(default)]
    entity_types: Vec<String>,
    #[serde(default)]
    property_filters: serde_json::Map<String, Value>,
    #[serde(default)]
    graph_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn graph_query(
    State(ctx): State<AppContext>,
    Json(body): Json<GraphQueryBody>,
) -> Json<Value> {
    let limit = body.limit.unwrap_or(50);
    let mut results: Vec<Value> = Vec::new();
    if let Some(graph) = ctx.indexer.graph_store() {
        if let Ok(records) = graph
            .entities_filtered(&body.entity_types, body.graph_id.as_deref(), limit * 2)
            .await
        {
            results.extend(records.into_iter().map(|r| {
                json!({"id": r.id, "name": r.name, "type": r.entity_type, "properties": r.properties})
            }));
        }
    }
    if results.is_empty() && !body.query_text.is_empty() {
        results.extend(
            ctx.indexer
                .search_entities(&body.query_text, limit)
                .await
                .into_iter()
                .map(|hit| {
                    json!({"id": hit.id, "name": hit.name, "type": hit.entity_type, "properties": hit.properties})
                }),
        );
    }
    let mut results = ledgergraph_agent::filter_by_properties(results, &body.property_filters);
    results.truncate(limit);
    Json(json!({"count": results.len(), "results": results}))
}

async fn list_entities(State(ctx): State<AppContext>) -> Json<Value> {
    let entities: Vec<Value> = ctx
        .state
        .entities
        .read()
        .values()
        .flatten()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();
    Json(json!({"count": entities.len(), "entities": entities}))
}

async fn entities_for_graph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<Value> {
    let entities = ctx.state.graph_entities(&id);
    Json(json!({"graph_id": id, "count": entities.len(), "entities": entities}))
}

async fn get_entity(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let entity = ctx
        .state
        .entities
        .read()
        .values()
        .flatten()
        .find(|e| e.id == id)
        .cloned()
        .ok_or_else(|| Error::not_found(format!("entity {id}")))?;
    Ok(Json(serde_json::to_value(entity).map_err(Error::from)?))
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn search_entities(
    State(ctx): State<AppContext>,
    Json(body): Json<SearchBody>,
) -> Json<Value> {
    let hits = ctx
        .indexer
        .search_entities(&body.query, body.limit.unwrap_or(10))
        .await;
    let results: Vec<Value> = hits
        .into_iter()
        .map(|hit| {
            json!({
                "id": hit.id,
                "name": hit.name,
                "type": hit.entity_type,
                "properties": hit.properties,
                "citations": hit.citations,
            })
        })
        .collect();
    Json(json!({"count": results.len(), "results": results}))
}

async fn list_relationships(State(ctx): State<AppContext>) -> Json<Value> {
    let edges: Vec<Value> = ctx
        .state
        .graphs
        .read()
        .values()
        .flat_map(|g| g.edges.iter())
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();
    Json(json!({"count": edges.len(), "relationships": edges}))
}

async fn relationships_for_graph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let graph = ctx
        .state
        .graph(&id)
        .ok_or_else(|| Error::not_found(format!("graph {id}")))?;
    Ok(Json(json!({
        "graph_id": id,
        "count": graph.edges.len(),
        "relationships": graph.edges,
    })))
}

// ---- analytics ----

async fn analytics_dashboard(State(ctx): State<AppContext>) -> Json<Value> {
    let documents = ctx.state.documents.read().len();
    let graphs = ctx.state.graphs.read().len();
    let entities: usize = ctx.state.entities.read().values().map(Vec::len).sum();
    let edges: usize = ctx.state.graphs.read().values().map(|g| g.edges.len()).sum();
    let risks = ctx.state.all_risks();
    Json(json!({
        "documents": documents,
        "graphs": graphs,
        "entities": entities,
        "relationships": edges,
        "risks": RiskDetector::risk_summary(&risks),
        "metrics": ctx.analytics.list_metrics(),
    }))
}

async fn analytics_risk_trends(State(ctx): State<AppContext>) -> Json<Value> {
    let risks = ctx.state.all_risks();
    let mut by_type: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for risk in &risks {
        *by_type.entry(risk.risk_type.clone()).or_default() += 1;
    }
    Json(json!({
        "total": risks.len(),
        "by_severity": RiskDetector::risk_summary(&risks),
        "by_type": by_type,
    }))
}

// ---- chat ----

#[derive(Deserialize)]
struct SessionBody {
    name: String,
}

async fn create_session(
    State(ctx): State<AppContext>,
    Json(body): Json<SessionBody>,
) -> Json<Value> {
    let session = ctx.sessions.create_session(body.name);
    Json(serde_json::to_value(session).unwrap_or_default())
}

async fn list_sessions(State(ctx): State<AppContext>) -> Json<Value> {
    let sessions = ctx.sessions.list_sessions();
    Json(json!({"count": sessions.len(), "sessions": sessions}))
}

async fn get_session(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = ctx.sessions.get_session(&id)?;
    Ok(Json(serde_json::to_value(session).map_err(Error::from)?))
}

async fn rename_session(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<SessionBody>,
) -> ApiResult<Json<Value>> {
    let session = ctx.sessions.rename_session(&id, body.name)?;
    Ok(Json(serde_json::to_value(session).map_err(Error::from)?))
}

async fn delete_session(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    ctx.sessions.delete_session(&id)?;
    Ok(Json(json!({"deleted": id})))
}

async fn list_messages(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let messages = ctx.sessions.list_messages(&id)?;
    Ok(Json(json!({"count": messages.len(), "messages": messages})))
}

#[derive(Deserialize)]
struct MessageBody {
    content: String,
}

async fn post_message(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> ApiResult<Json<Value>> {
    let message = ctx
        .sessions
        .append_message(&id, ChatRole::User, body.content, None)?;
    Ok(Json(serde_json::to_value(message).map_err(Error::from)?))
}

async fn attach_document(
    State(ctx): State<AppContext>,
    Path((id, doc_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let session = ctx.sessions.attach_document(&id, &doc_id)?;
    Ok(Json(serde_json::to_value(session).map_err(Error::from)?))
}

async fn detach_document(
    State(ctx): State<AppContext>,
    Path((id, doc_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let session = ctx.sessions.detach_document(&id, &doc_id)?;
    Ok(Json(serde_json::to_value(session).map_err(Error::from)?))
}

#[derive(Deserialize)]
struct AskBody {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    graph_id: Option<String>,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    document_ids: Vec<String>,
}

/// Ad-hoc chat. Streams `data: {content, done}` frames; a failure yields a
/// terminal `{error: true, done: true}` frame with a neutral message.
async fn ask(
    State(ctx): State<AppContext>,
    Json(body): Json<AskBody>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let context = build_chat_context(&ctx, &body);
    if let Some(session_id) = &body.session_id {
        if let Err(err) =
            ctx.sessions
                .append_message(session_id, ChatRole::User, body.message.clone(), None)
        {
            tracing::warn!(error = %err, "could not record user message");
        }
    }

    let agent = ctx.agent.clone();
    let sessions = ctx.sessions.clone();
    let session_id = body.session_id.clone();
    let message = body.message;

    let stream = async_stream::stream! {
        let mut response_text = String::new();
        let mut failed = false;
        let mut chunks = Box::pin(agent.chat(message, context));
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(content) => {
                    response_text.push_str(&content);
                    let frame = json!({"content": content, "done": false});
                    yield Ok(Event::default().data(frame.to_string()));
                }
                Err(err) => {
                    tracing::error!(error = %err, "chat stream failed");
                    failed = true;
                    break;
                }
            }
        }

        if failed {
            let frame = json!({
                "content": "I ran into a problem answering that. Please try again.",
                "error": true,
                "done": true,
            });
            yield Ok(Event::default().data(frame.to_string()));
            return;
        }

        if let Some(session_id) = session_id {
            if let Err(err) = sessions.append_message(
                &session_id,
                ChatRole::Assistant,
                response_text.clone(),
                None,
            ) {
                tracing::warn!(error = %err, "could not record assistant message");
            }
        }
        yield Ok(Event::default().data(json!({"content": "", "done": true}).to_string()));
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Assemble the agent context: explicit scope from the request plus entity
/// snapshots for the referenced graph.
fn build_chat_context(ctx: &AppContext, body: &AskBody) -> ChatContext {
    let graph_id = body.graph_id.clone().or_else(|| {
        body.document_id
            .as_ref()
            .and_then(|id| ctx.state.document(id))
            .and_then(|d| d.graph_id)
    });
    let entities: Vec<Value> = graph_id
        .as_ref()
        .map(|id| ctx.state.graph_entities(id))
        .unwrap_or_default()
        .iter()
        .take(100)
        .map(|e| {
            json!({
                "id": e.id,
                "name": e.name,
                "type": e.entity_type.as_str(),
                "properties": e.properties,
            })
        })
        .collect();
    let total_entities: usize = ctx.state.entities.read().values().map(Vec::len).sum();
    let total_documents = ctx.state.documents.read().len();

    ChatContext {
        graph_id,
        document_id: body.document_id.clone(),
        document_ids: body.document_ids.clone(),
        entities,
        total_entities,
        total_documents,
    }
}
