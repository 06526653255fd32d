//! Query pipeline: rewrite → retrieve → assemble → answer.
//!
//! Each call is a function of the message, the caller-owned history, and the
//! index contents. Nothing is remembered between turns.

pub mod answerer;
pub mod history;
pub mod retriever;
pub mod rewriter;

pub use answerer::{CONTEXT_SEPARATOR, answer, assemble_context, build_answer_messages};
pub use history::{ConversationTurn, history_to_messages, recent_turns, render_transcript};
pub use retriever::retrieve;
pub use rewriter::rewrite_query;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::prompts::PromptEngine;
use crate::vector::VectorIndex;

use std::sync::Arc;

/// Tuning for a [`QueryPipeline`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Most recent turns forwarded to the model. 0 keeps everything.
    pub max_history_turns: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_history_turns: 20,
        }
    }
}

/// Collaborators wired together once at startup and shared by every
/// front-end for the life of the process.
pub struct QueryPipeline {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    prompts: PromptEngine,
    options: QueryOptions,
}

impl QueryPipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: QueryOptions,
    ) -> Result<Self> {
        Ok(Self {
            llm,
            embedder,
            index,
            prompts: PromptEngine::new()?,
            options,
        })
    }

    /// Answer `message` given the conversation so far.
    pub async fn respond(&self, message: &str, history: &[ConversationTurn]) -> Result<String> {
        let history = recent_turns(history, self.options.max_history_turns);

        let search_query =
            rewrite_query(self.llm.as_ref(), &self.prompts, message, history).await?;
        let chunks = retrieve(
            self.embedder.as_ref(),
            self.index.as_ref(),
            &search_query,
            self.options.top_k,
        )
        .await?;
        let response = answer(self.llm.as_ref(), &self.prompts, &chunks, history, message).await?;

        tracing::info!(
            history_turns = history.len(),
            retrieved = chunks.len(),
            "query answered"
        );

        Ok(response)
    }

    /// The index this pipeline reads from.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }
}
