//! Search-query generation from the latest question plus history.

use crate::error::Result;
use crate::llm::{ChatMessage, LanguageModel};
use crate::prompts::PromptEngine;
use crate::query::history::{ConversationTurn, render_transcript};

/// Ask the model to fold `history` and `question` into one standalone
/// search query. One model call; errors propagate unchanged.
pub async fn rewrite_query(
    llm: &dyn LanguageModel,
    prompts: &PromptEngine,
    question: &str,
    history: &[ConversationTurn],
) -> Result<String> {
    let prompt = prompts.render_search_query(&render_transcript(history), question)?;
    let query = llm.complete(&[ChatMessage::user(prompt)]).await?;
    let query = query.trim().to_string();

    tracing::debug!(%query, "search query generated");
    Ok(query)
}
