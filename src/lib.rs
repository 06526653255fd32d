//! Docent: retrieval-augmented question answering over a text corpus.
//!
//! Two pipelines share one vector index. [`ingest`] loads a document,
//! splits it into chunks, embeds them, and stores them. [`query`] turns a
//! conversational question into a search query, retrieves matching chunks,
//! and asks a language model to answer from them.

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod prompts;
pub mod query;
pub mod vector;

pub use config::Config;
pub use error::{Error, Result};
