//! Fixed-size character splitting.

use crate::error::{ConfigError, Result};
use crate::ingest::loader::Document;

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A contiguous slice of a document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Stable id derived from the source path and chunk position.
    pub id: String,
    pub text: String,
    /// Parent metadata plus `chunk_index`.
    pub metadata: BTreeMap<String, String>,
}

/// Splits documents into windows of at most `chunk_size` characters,
/// consecutive windows sharing `chunk_overlap` characters.
///
/// Sizes count Unicode scalar values, not bytes. With zero overlap a
/// document of `L` characters yields `ceil(L / chunk_size)` chunks whose
/// concatenation is the original text.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk size must be positive".into()).into());
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            ))
            .into());
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.text.as_str();

        // Byte offset of every char, plus the end of the text.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let char_count = boundaries.len();
        boundaries.push(text.len());

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            let chunk_index = chunks.len();

            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), chunk_index.to_string());

            chunks.push(Chunk {
                id: chunk_id(document.source(), chunk_index),
                text: text[boundaries[start]..boundaries[end]].to_string(),
                metadata,
            });

            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn chunk_id(source: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk_index.to_le_bytes());
    let digest = hasher.finalize();
    format!("chunk_{}", hex::encode(&digest[..8]))
}
