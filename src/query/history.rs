//! Conversation history supplied by the front-end on every turn.

use crate::llm::ChatMessage;
use serde::{Deserialize, Serialize};

/// One exchange: what the user said and what the assistant answered.
///
/// Serialized as a two-element array, `["user text", "assistant text"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn(pub String, pub String);

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self(user.into(), assistant.into())
    }

    pub fn user(&self) -> &str {
        &self.0
    }

    pub fn assistant(&self) -> &str {
        &self.1
    }
}

/// Expand turns into alternating user/assistant messages, preserving order.
pub fn history_to_messages(history: &[ConversationTurn]) -> Vec<ChatMessage> {
    history
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.user()),
                ChatMessage::assistant(turn.assistant()),
            ]
        })
        .collect()
}

/// Render turns as labelled transcript lines for the search-query prompt.
pub fn render_transcript(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.user(), turn.assistant()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Keep only the most recent `max_turns` turns. `0` keeps everything.
pub fn recent_turns(history: &[ConversationTurn], max_turns: usize) -> &[ConversationTurn] {
    if max_turns == 0 || history.len() <= max_turns {
        return history;
    }
    &history[history.len() - max_turns..]
}
