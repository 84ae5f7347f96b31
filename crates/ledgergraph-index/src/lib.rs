//! Dual indexing of the knowledge graph: entities into a vector store for
//! semantic search and into a graph store for structural query, plus
//! document text chunking.
//!
//! Both stores sit behind traits so the pipeline degrades gracefully when
//! a backend is disabled or unreachable, and so tests can substitute
//! in-memory fakes.

pub mod chunker;
pub mod graph;
pub mod indexer;
pub mod vector;

pub use chunker::{chunk_document_text, DocumentChunk};
pub use graph::{
    ConnectedEntity, EntityRecord, GraphPath, GraphStore, Neo4jGraphStore, PatternMatch,
    TraverseDirection,
};
pub use indexer::{IndexStats, Indexer};
pub use vector::{ChunkHit, EntityHit, VectorStore, WeaviateVectorStore};
