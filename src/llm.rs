//! Language-model collaborator.
//!
//! The pipeline talks to models through [`LanguageModel`] using plain
//! role-tagged messages. [`RigLanguageModel`] adapts any Rig completion model
//! to that interface.

use crate::error::{LlmError, Result};

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{AssistantContent, CompletionModel, Message, Prompt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a message sequence sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Produces a completion for an ordered message sequence.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Adapts a Rig completion model.
///
/// A leading system message becomes the agent preamble and the final user
/// message the prompt; everything in between is replayed as history.
pub struct RigLanguageModel<M> {
    model: M,
    temperature: f64,
}

impl<M> RigLanguageModel<M> {
    pub fn new(model: M, temperature: f64) -> Self {
        Self { model, temperature }
    }
}

#[async_trait]
impl<M> LanguageModel for RigLanguageModel<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = RigRequest::from_messages(messages)?;

        let mut builder = AgentBuilder::new(self.model.clone()).temperature(self.temperature);
        if let Some(preamble) = &request.preamble {
            builder = builder.preamble(preamble);
        }
        let agent = builder.build();

        let mut history = request.history;
        agent
            .prompt(request.prompt.as_str())
            .with_history(&mut history)
            .await
            .map_err(|error| LlmError::CompletionFailed(error.to_string()).into())
    }
}

/// A message sequence split into the shape Rig agents take.
#[derive(Debug)]
struct RigRequest {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: String,
}

impl RigRequest {
    fn from_messages(messages: &[ChatMessage]) -> Result<Self> {
        let (preamble, rest) = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first.content.clone()), rest),
            _ => (None, messages),
        };

        let Some((last, earlier)) = rest.split_last() else {
            return Err(LlmError::InvalidMessages("no prompt message".into()).into());
        };
        if last.role != Role::User {
            return Err(
                LlmError::InvalidMessages("last message must come from the user".into()).into(),
            );
        }

        let mut history = Vec::with_capacity(earlier.len());
        for message in earlier {
            match message.role {
                Role::User => history.push(Message::from(message.content.as_str())),
                Role::Assistant => {
                    let content = AssistantContent::from(message.content.clone());
                    history.push(Message::from(content));
                }
                Role::System => {
                    return Err(LlmError::InvalidMessages(
                        "system message only allowed first".into(),
                    )
                    .into());
                }
            }
        }

        Ok(Self {
            preamble,
            history,
            prompt: last.content.clone(),
        })
    }
}
