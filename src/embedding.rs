//! Embedding generation.
//!
//! The same [`Embedder`] is used at ingestion and query time so that index
//! vectors and query vectors are comparable.

use crate::error::{LlmError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text, returning one vector per input in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Dimension of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmbeddingFailed("provider returned no vectors".into()).into())
    }
}

/// Local embedding model backed by fastembed.
///
/// fastembed's TextEmbedding is not Send, so we hold it behind an Arc and
/// use spawn_blocking to call into it from async contexts.
pub struct EmbeddingModel {
    model: Arc<fastembed::TextEmbedding>,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Create the default model (BGE-small, 384 dimensions), storing
    /// downloaded model files in `cache_dir`.
    ///
    /// ONNX Runtime reads `OMP_NUM_THREADS` here; the binary sets it before
    /// starting any threads.
    pub fn new(cache_dir: &Path) -> Result<Self> {
        let options = fastembed::InitOptions::default()
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(true);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| LlmError::EmbeddingFailed(e.to_string()))?;

        tracing::debug!(cache_dir = %cache_dir.display(), "embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            dimensions: 384,
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingModel {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| crate::Error::from(LlmError::EmbeddingFailed(e.to_string())))
        })
        .await
        .map_err(|e| crate::Error::Other(anyhow::anyhow!("embedding task failed: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
