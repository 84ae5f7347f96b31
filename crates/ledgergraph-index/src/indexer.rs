//! Dual-store indexer facade.
//!
//! Wraps the optional vector and graph stores; a disabled or unreachable
//! backend degrades to zero counts and empty search results instead of
//! failing the pipeline.

use std::sync::Arc;

use ledgergraph::models::{Edge, Entity};
use ledgergraph::Result;

use crate::chunker::chunk_document_text;
use crate::graph::GraphStore;
use crate::vector::{ChunkHit, EntityHit, VectorStore};

/// Counts of what actually got indexed, per backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub vector_count: usize,
    pub graph_count: usize,
    pub chunks_indexed: usize,
}

#[derive(Clone, Default)]
pub struct Indexer {
    vector: Option<Arc<dyn VectorStore>>,
    graph: Option<Arc<dyn GraphStore>>,
}

impl Indexer {
    #[must_use]
    pub fn new(vector: Option<Arc<dyn VectorStore>>, graph: Option<Arc<dyn GraphStore>>) -> Self {
        Self { vector, graph }
    }

    #[must_use]
    pub fn vector_store(&self) -> Option<&Arc<dyn VectorStore>> {
        self.vector.as_ref()
    }

    #[must_use]
    pub fn graph_store(&self) -> Option<&Arc<dyn GraphStore>> {
        self.graph.as_ref()
    }

    /// Upsert entities into both stores.
    pub async fn index_entities(&self, entities: &[Entity]) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        if entities.is_empty() {
            tracing::warn!("no entities to index");
            return Ok(stats);
        }
        if let Some(vector) = &self.vector {
            match vector.upsert_entities(entities).await {
                Ok(count) => stats.vector_count = count,
                Err(err) => tracing::error!(error = %err, "vector store entity indexing failed"),
            }
        }
        if let Some(graph) = &self.graph {
            match graph.upsert_entities(entities).await {
                Ok(count) => stats.graph_count = count,
                Err(err) => tracing::error!(error = %err, "graph store entity indexing failed"),
            }
        }
        Ok(stats)
    }

    /// Create typed relationships in the graph store.
    pub async fn index_edges(&self, edges: &[Edge]) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        let Some(graph) = &self.graph else {
            tracing::warn!("graph store not available, skipping edge indexing");
            return Ok(stats);
        };
        match graph.create_edges(edges).await {
            Ok(count) => stats.graph_count = count,
            Err(err) => tracing::error!(error = %err, "graph store edge indexing failed"),
        }
        Ok(stats)
    }

    /// Chunk and index a document's text for semantic search.
    pub async fn index_document_text(
        &self,
        document_id: &str,
        markdown: &str,
        filename: &str,
        entities: &[Entity],
        total_pages: Option<u32>,
    ) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        let Some(vector) = &self.vector else {
            tracing::warn!("vector store not available, skipping document text indexing");
            return Ok(stats);
        };
        let chunks = chunk_document_text(document_id, markdown, filename, entities, total_pages);
        if chunks.is_empty() {
            return Ok(stats);
        }
        match vector.upsert_chunks(&chunks).await {
            Ok(count) => stats.chunks_indexed = count,
            Err(err) => tracing::error!(error = %err, "chunk indexing failed"),
        }
        Ok(stats)
    }

    /// Semantic entity search. Empty on store unavailability, never an
    /// upstream failure.
    pub async fn search_entities(&self, query: &str, limit: usize) -> Vec<EntityHit> {
        let Some(vector) = &self.vector else {
            return Vec::new();
        };
        match vector.search_entities(query, limit).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::error!(error = %err, "entity search failed");
                Vec::new()
            }
        }
    }

    /// Semantic chunk search, same degradation contract.
    pub async fn search_chunks(&self, query: &str, limit: usize) -> Vec<ChunkHit> {
        let Some(vector) = &self.vector else {
            return Vec::new();
        };
        match vector.search_chunks(query, limit).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::error!(error = %err, "chunk search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledgergraph::models::EntityType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingVectorStore {
        entities: AtomicUsize,
        chunks: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for CountingVectorStore {
        async fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
            self.entities.fetch_add(entities.len(), Ordering::SeqCst);
            Ok(entities.len())
        }
        async fn upsert_chunks(&self, chunks: &[crate::chunker::DocumentChunk]) -> Result<usize> {
            self.chunks.fetch_add(chunks.len(), Ordering::SeqCst);
            Ok(chunks.len())
        }
        async fn search_entities(&self, _query: &str, _limit: usize) -> Result<Vec<EntityHit>> {
            Ok(Vec::new())
        }
        async fn search_chunks(&self, _query: &str, _limit: usize) -> Result<Vec<ChunkHit>> {
            Ok(Vec::new())
        }
    }

    fn entity(name: &str) -> Entity {
        Entity::new(
            ledgergraph::ids::entity_id(),
            EntityType::Company,
            name,
            "doc_1",
            "graph_1",
        )
    }

    #[tokio::test]
    async fn missing_stores_degrade_to_zero_counts() {
        let indexer = Indexer::new(None, None);
        let stats = indexer.index_entities(&[entity("Acme")]).await.unwrap();
        assert_eq!(stats, IndexStats::default());
        assert!(indexer.search_entities("acme", 5).await.is_empty());
        assert!(indexer.search_chunks("acme", 5).await.is_empty());
    }

    #[tokio::test]
    async fn vector_store_receives_entities_and_chunks() {
        let store = Arc::new(CountingVectorStore::default());
        let indexer = Indexer::new(Some(store.clone() as Arc<dyn VectorStore>), None);

        let stats = indexer
            .index_entities(&[entity("Acme"), entity("Beta")])
            .await
            .unwrap();
        assert_eq!(stats.vector_count, 2);

        let text = (0..600).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let stats = indexer
            .index_document_text("doc_1", &text, "q4.pdf", &[], Some(2))
            .await
            .unwrap();
        assert!(stats.chunks_indexed >= 2);
        assert_eq!(store.chunks.load(Ordering::SeqCst), stats.chunks_indexed);
    }
}
