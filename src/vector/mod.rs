//! Vector index storage and nearest-neighbour lookup.
//!
//! Chunks are persisted with their embeddings in a LanceDB table; an
//! in-memory index with the same contract backs tests and throwaway runs.

pub mod memory;
pub mod table;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use memory::InMemoryIndex;
pub use table::LanceIndex;

/// A chunk and its embedding, ready to be written to an index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Stable identifier; writing an entry with an existing id replaces it.
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub embedding: Vec<f32>,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    /// Similarity to the query, higher is closer.
    pub score: f32,
}

/// Persistent store supporting nearest-neighbour lookup over embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace entries by id.
    async fn write(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Remove every entry whose `source` metadata equals `source`.
    async fn delete_source(&self, source: &str) -> Result<()>;

    /// Return the `k` entries closest to `query`, most similar first.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize>;
}
