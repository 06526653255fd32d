//! In-memory vector index using cosine similarity.

use crate::error::{DbError, Result};
use crate::vector::{IndexEntry, RetrievedChunk, VectorIndex};

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Non-persistent index keyed by entry id.
#[derive(Debug)]
pub struct InMemoryIndex {
    dimensions: usize,
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(DbError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn write(&self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in &entries {
            self.check_dimensions(&entry.embedding)?;
        }

        let mut stored = self.entries.write().await;
        for entry in entries {
            stored.insert(entry.id.clone(), entry);
        }
        Ok(())
    }

    async fn delete_source(&self, source: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.metadata.get("source").map(String::as_str) != Some(source));
        Ok(())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        self.check_dimensions(query)?;

        let stored = self.entries.read().await;
        let mut scored: Vec<RetrievedChunk> = stored
            .values()
            .map(|entry| RetrievedChunk {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&entry.embedding, query),
            })
            .collect();

        // Ties broken by id so repeated searches are deterministic.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            text: format!("text of {id}"),
            metadata: BTreeMap::new(),
            embedding,
        }
    }

    #[tokio::test]
    async fn search_ranks_closest_entry_first() {
        let index = InMemoryIndex::new(3);
        index
            .write(vec![
                entry("x", vec![1.0, 0.0, 0.0]),
                entry("y", vec![0.0, 1.0, 0.0]),
                entry("z", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .expect("write");

        let results = index
            .similarity_search(&[0.1, 0.9, 0.2], 2)
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "y");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn write_replaces_entries_with_the_same_id() {
        let index = InMemoryIndex::new(2);
        index.write(vec![entry("a", vec![1.0, 0.0])]).await.expect("first write");
        index.write(vec![entry("a", vec![0.0, 1.0])]).await.expect("second write");
        assert_eq!(index.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn delete_source_only_removes_that_source() {
        let index = InMemoryIndex::new(2);
        let mut other = entry("b", vec![0.0, 1.0]);
        other.metadata.insert("source".to_string(), "b.txt".to_string());
        let mut target = entry("a", vec![1.0, 0.0]);
        target.metadata.insert("source".to_string(), "a.txt".to_string());
        index.write(vec![target, other]).await.expect("write");

        index.delete_source("a.txt").await.expect("delete");

        let remaining = index.similarity_search(&[1.0, 0.0], 5).await.expect("search");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }

    #[tokio::test]
    async fn rejects_vectors_of_the_wrong_dimension() {
        let index = InMemoryIndex::new(2);
        let result = index.write(vec![entry("a", vec![1.0, 0.0, 0.0])]).await;
        assert!(matches!(
            result,
            Err(crate::Error::Db(DbError::DimensionMismatch { expected: 2, actual: 3 }))
        ));
    }

    #[test]
    fn zero_vector_has_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
