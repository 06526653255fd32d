//! Similarity retrieval for a search query.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector::{RetrievedChunk, VectorIndex};

/// Embed `query` and return the `k` closest chunks in the index's ranking
/// order. No re-ranking or filtering.
pub async fn retrieve(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let vector = embedder.embed_one(query).await?;
    let chunks = index.similarity_search(&vector, k).await?;

    tracing::debug!(k, retrieved = chunks.len(), "chunks retrieved");
    Ok(chunks)
}
