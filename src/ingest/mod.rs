//! Ingestion pipeline: load, split, embed, and store.
//!
//! Run once, offline, before the query pipeline starts serving. A document's
//! previous entries are removed before its new chunks are written, so an
//! edited file never leaves stale chunks behind. Any embedding or storage
//! failure aborts the run; entries already written stay in the index.

pub mod loader;
pub mod splitter;

pub use loader::{Document, load_document};
pub use splitter::{Chunk, TextSplitter};

use crate::embedding::Embedder;
use crate::error::{LlmError, Result};
use crate::vector::{IndexEntry, VectorIndex};

use std::path::Path;
use std::sync::Arc;

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
}

/// Writes chunked, embedded documents into a vector index.
pub struct Ingestor {
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            splitter,
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Load the file at `path` and ingest it.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestStats> {
        let document = load_document(path).await?;
        self.ingest_documents(&[document]).await
    }

    /// Split, embed, and store every document.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestStats> {
        let mut stats = IngestStats {
            documents: documents.len(),
            ..Default::default()
        };

        for document in documents {
            let chunks = self.splitter.split(document);
            stats.chunks += chunks.len();

            self.index.delete_source(document.source()).await?;

            for batch in chunks.chunks(self.batch_size) {
                stats.indexed += self.index_batch(batch).await?;
            }

            tracing::debug!(source = document.source(), chunks = chunks.len(), "document ingested");
        }

        tracing::info!(
            documents = stats.documents,
            chunks = stats.chunks,
            indexed = stats.indexed,
            "ingestion complete"
        );

        Ok(stats)
    }

    async fn index_batch(&self, batch: &[Chunk]) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;

        if embeddings.len() != batch.len() {
            return Err(LlmError::EmbeddingFailed(format!(
                "expected {} vectors, provider returned {}",
                batch.len(),
                embeddings.len()
            ))
            .into());
        }

        let entries: Vec<IndexEntry> = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                embedding,
            })
            .collect();

        let written = entries.len();
        self.index.write(entries).await?;
        Ok(written)
    }
}
