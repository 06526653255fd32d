//! Source document loading.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Raw text of one source file plus its metadata. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), source.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Path the document was read from.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Read a UTF-8 text file into a single [`Document`].
pub async fn load_document(path: &Path) -> Result<Document> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::debug!(path = %path.display(), chars = text.chars().count(), "loaded document");

    Ok(Document::new(text, path.to_string_lossy()))
}
