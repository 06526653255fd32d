//! Configuration loading.
//!
//! Values are layered, later sources winning:
//! 1. Built-in defaults.
//! 2. `{config_dir}/docent/docent.toml`, then `./docent.toml` (both optional),
//!    or a single explicit file passed with `--config`.
//! 3. `DOCENT__SECTION__KEY` environment variables.
//!
//! CLI flags are applied on top by the binary.

use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "docent.toml";
const ENV_PREFIX: &str = "DOCENT";

/// Top-level configuration, built once at process start.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Splitter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 0,
        }
    }
}

/// Where the vector index lives on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub directory: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            directory: data_dir().join("index"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimension (must match the embedding model).
    pub dimensions: usize,
    /// Number of chunks to embed per batch.
    pub batch_size: usize,
    /// Where downloaded model files are cached.
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            batch_size: 32,
            cache_dir: data_dir().join("models"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat model name passed to the provider.
    pub model: String,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks fetched per query.
    pub top_k: usize,
    /// Most recent turns forwarded to the model. 0 keeps the whole history.
    pub max_history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_history_turns: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7860".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily-rotated file here.
    pub directory: Option<PathBuf>,
}

impl Config {
    /// Load configuration from defaults, config files, and the environment.
    ///
    /// An explicit `path` must exist; the implicit locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(config_dir) = dirs::config_dir() {
                    let global = config_dir.join("docent").join(CONFIG_FILE_NAME);
                    builder = builder.add_source(config::File::from(global).required(false));
                }
                builder = builder
                    .add_source(config::File::from(Path::new(CONFIG_FILE_NAME)).required(false));
            }
        }

        let config: Config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::from)?
            .try_deserialize()
            .map_err(ConfigError::from)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipelines cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.chunk_size == 0 {
            return Err(ConfigError::Invalid("ingest.chunk_size must be positive".into()).into());
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            ))
            .into());
        }
        if self.embedding.dimensions == 0 {
            return Err(
                ConfigError::Invalid("embedding.dimensions must be positive".into()).into(),
            );
        }
        if self.embedding.batch_size == 0 {
            return Err(
                ConfigError::Invalid("embedding.batch_size must be positive".into()).into(),
            );
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be positive".into()).into());
        }
        Ok(())
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docent")
}
