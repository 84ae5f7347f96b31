//! Vector store seam and the Weaviate implementation.
//!
//! Weaviate is spoken over its REST and GraphQL APIs with server-side
//! vectorization, so no local embedding model is involved. Two
//! collections: `FinancialEntity` (one object per entity) and
//! `DocumentChunk` (text passages).

use async_trait::async_trait;
use ledgergraph::models::Entity;
use ledgergraph::{Error, Result};
use serde_json::{json, Value};

use crate::chunker::DocumentChunk;

const ENTITY_CLASS: &str = "FinancialEntity";
const CHUNK_CLASS: &str = "DocumentChunk";
const ENTITY_BATCH_SIZE: usize = 100;
const CHUNK_BATCH_SIZE: usize = 50;

/// An entity returned from semantic search.
#[derive(Debug, Clone)]
pub struct EntityHit {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub properties: Value,
    pub citations: Value,
    pub graph_id: Option<String>,
}

/// A document chunk returned from semantic search.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub page_number: u32,
    pub filename: String,
    pub entity_refs: Vec<String>,
    pub score: Option<f64>,
}

/// Vector store operations the indexer and the agent need.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collections when they do not exist yet.
    async fn ensure_schema(&self) -> Result<()>;
    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize>;
    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize>;
    async fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<EntityHit>>;
    async fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>>;
}

/// Weaviate over REST/GraphQL.
#[derive(Clone)]
pub struct WeaviateVectorStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeaviateVectorStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn class_exists(&self, class: &str) -> Result<bool> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/schema/{class}"))
            .send()
            .await
            .map_err(|e| Error::store(format!("weaviate unreachable: {e}")))?;
        Ok(response.status().is_success())
    }

    async fn create_class(&self, definition: Value) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&definition)
            .send()
            .await
            .map_err(|e| Error::store(format!("weaviate unreachable: {e}")))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::store(format!(
                "weaviate schema creation failed ({status}): {body}"
            )));
        }
        Ok(())
    }

    async fn batch_objects(&self, objects: Vec<Value>, batch_size: usize) -> Result<usize> {
        let mut stored = 0usize;
        for batch in objects.chunks(batch_size) {
            let response = self
                .request(reqwest::Method::POST, "/v1/batch/objects")
                .json(&json!({"objects": batch}))
                .send()
                .await
                .map_err(|e| Error::store(format!("weaviate batch failed: {e}")))?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::store(format!(
                    "weaviate batch rejected ({status}): {body}"
                )));
            }
            stored += batch.len();
        }
        Ok(stored)
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({"query": query}))
            .send()
            .await
            .map_err(|e| Error::store(format!("weaviate query failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(Error::store(format!("weaviate query rejected ({status})")));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::store(format!("unparseable weaviate response: {e}")))
    }
}

fn escape_graphql(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl VectorStore for WeaviateVectorStore {
    async fn ensure_schema(&self) -> Result<()> {
        if !self.class_exists(ENTITY_CLASS).await? {
            self.create_class(json!({
                "class": ENTITY_CLASS,
                "description": "Financial entities from documents",
                "vectorizer": "text2vec-transformers",
                "properties": [
                    {"name": "entityId", "dataType": ["text"]},
                    {"name": "entityType", "dataType": ["text"]},
                    {"name": "name", "dataType": ["text"]},
                    {"name": "properties", "dataType": ["text"]},
                    {"name": "citations", "dataType": ["text"]},
                    {"name": "documentId", "dataType": ["text"]},
                    {"name": "graphId", "dataType": ["text"]},
                ],
            }))
            .await?;
            tracing::info!(class = ENTITY_CLASS, "created vector collection");
        }
        if !self.class_exists(CHUNK_CLASS).await? {
            self.create_class(json!({
                "class": CHUNK_CLASS,
                "description": "Document text chunks for semantic search",
                "vectorizer": "text2vec-transformers",
                "properties": [
                    {"name": "chunkId", "dataType": ["text"]},
                    {"name": "documentId", "dataType": ["text"]},
                    {"name": "content", "dataType": ["text"]},
                    {"name": "chunkIndex", "dataType": ["int"]},
                    {"name": "pageNumber", "dataType": ["int"]},
                    {"name": "filename", "dataType": ["text"]},
                    {"name": "entityRefs", "dataType": ["text"]},
                ],
            }))
            .await?;
            tracing::info!(class = CHUNK_CLASS, "created chunk collection");
        }
        Ok(())
    }

    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
        let objects: Vec<Value> = entities
            .iter()
            .map(|entity| {
                json!({
                    "class": ENTITY_CLASS,
                    "properties": {
                        "entityId": entity.id,
                        "entityType": entity.entity_type.as_str(),
                        "name": entity.name,
                        "properties": serde_json::to_string(&entity.properties).unwrap_or_default(),
                        "citations": serde_json::to_string(&entity.citations).unwrap_or_default(),
                        "documentId": entity.document_id,
                        "graphId": entity.graph_id,
                    }
                })
            })
            .collect();
        let count = self.batch_objects(objects, ENTITY_BATCH_SIZE).await?;
        tracing::info!(count, "indexed entities to vector store");
        Ok(count)
    }

    async fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let objects: Vec<Value> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "class": CHUNK_CLASS,
                    "properties": {
                        "chunkId": chunk.chunk_id,
                        "documentId": chunk.document_id,
                        "content": chunk.content,
                        "chunkIndex": chunk.chunk_index,
                        "pageNumber": chunk.page_number,
                        "filename": chunk.filename,
                        "entityRefs": serde_json::to_string(&chunk.entity_refs).unwrap_or_default(),
                    }
                })
            })
            .collect();
        let count = self.batch_objects(objects, CHUNK_BATCH_SIZE).await?;
        tracing::info!(count, "indexed chunks to vector store");
        Ok(count)
    }

    async fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<EntityHit>> {
        let gql = format!(
            "{{ Get {{ {ENTITY_CLASS}(nearText: {{concepts: [\"{}\"]}}, limit: {limit}) \
             {{ entityId entityType name properties citations graphId }} }} }}",
            escape_graphql(query)
        );
        let body = self.graphql(gql).await?;
        let empty = Vec::new();
        let hits = body["data"]["Get"][ENTITY_CLASS]
            .as_array()
            .unwrap_or(&empty);
        Ok(hits
            .iter()
            .map(|hit| EntityHit {
                id: hit["entityId"].as_str().unwrap_or_default().to_string(),
                name: hit["name"].as_str().unwrap_or_default().to_string(),
                entity_type: hit["entityType"].as_str().unwrap_or_default().to_string(),
                properties: hit["properties"]
                    .as_str()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| json!({})),
                citations: hit["citations"]
                    .as_str()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| json!([])),
                graph_id: hit["graphId"].as_str().map(ToString::to_string),
            })
            .collect())
    }

    async fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<ChunkHit>> {
        let gql = format!(
            "{{ Get {{ {CHUNK_CLASS}(nearText: {{concepts: [\"{}\"]}}, limit: {limit}) \
             {{ chunkId documentId content pageNumber filename entityRefs \
             _additional {{ certainty }} }} }} }}",
            escape_graphql(query)
        );
        let body = self.graphql(gql).await?;
        let empty = Vec::new();
        let hits = body["data"]["Get"][CHUNK_CLASS].as_array().unwrap_or(&empty);
        Ok(hits
            .iter()
            .map(|hit| ChunkHit {
                chunk_id: hit["chunkId"].as_str().unwrap_or_default().to_string(),
                document_id: hit["documentId"].as_str().unwrap_or_default().to_string(),
                content: hit["content"].as_str().unwrap_or_default().to_string(),
                page_number: hit["pageNumber"].as_u64().unwrap_or(1) as u32,
                filename: hit["filename"].as_str().unwrap_or_default().to_string(),
                entity_refs: hit["entityRefs"]
                    .as_str()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_default(),
                score: hit["_additional"]["certainty"].as_f64(),
            })
            .collect())
    }
}
