//! Context assembly and answer generation.

use crate::error::Result;
use crate::llm::{ChatMessage, LanguageModel};
use crate::prompts::PromptEngine;
use crate::query::history::{ConversationTurn, history_to_messages};
use crate::vector::RetrievedChunk;

/// Placed between consecutive chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "---------";

/// Join the raw text of every chunk, in retrieval order.
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// System instruction with the context embedded, then the history, then the
/// new question.
pub fn build_answer_messages(
    prompts: &PromptEngine,
    context: &str,
    history: &[ConversationTurn],
    question: &str,
) -> Result<Vec<ChatMessage>> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(prompts.render_answer_system(context)?));
    messages.extend(history_to_messages(history));
    messages.push(ChatMessage::user(question));
    Ok(messages)
}

/// Answer `question` from `chunks`. The model output is returned verbatim.
pub async fn answer(
    llm: &dyn LanguageModel,
    prompts: &PromptEngine,
    chunks: &[RetrievedChunk],
    history: &[ConversationTurn],
    question: &str,
) -> Result<String> {
    let context = assemble_context(chunks);
    if context.is_empty() {
        tracing::debug!("answering with an empty context block");
    }

    let messages = build_answer_messages(prompts, &context, history, question)?;
    llm.complete(&messages).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use std::collections::BTreeMap;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: text.to_string(),
            text: text.to_string(),
            metadata: BTreeMap::new(),
            score: 1.0,
        }
    }

    #[test]
    fn context_joins_raw_chunks_in_order() {
        let chunks = vec![chunk("second best"), chunk(" spaced  text "), chunk("third")];
        assert_eq!(
            assemble_context(&chunks),
            "second best--------- spaced  text ---------third"
        );
    }

    #[test]
    fn empty_retrieval_gives_empty_context() {
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn messages_wrap_context_then_history_then_question() {
        let prompts = PromptEngine::new().expect("prompts");
        let history = vec![ConversationTurn::new("hi", "hello")];

        let messages = build_answer_messages(&prompts, "ctx", &history, "What sat?")
            .expect("messages");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.ends_with("ctx"));
        assert_eq!(messages[1], ChatMessage::user("hi"));
        assert_eq!(messages[2], ChatMessage::assistant("hello"));
        assert_eq!(messages[3], ChatMessage::user("What sat?"));
    }
}
