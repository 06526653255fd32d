//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docent::embedding::Embedder;
use docent::error::{LlmError, Result};
use docent::llm::{ChatMessage, LanguageModel, Role};
use std::sync::Mutex;

pub const VOCABULARY: [&str; 4] = ["cat", "sat", "dog", "ran"];

/// Embeds text as counts of each vocabulary word plus a constant bias
/// component, so no text maps to the zero vector.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| keyword_vector(text)).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    let mut vector: Vec<f32> = VOCABULARY
        .iter()
        .map(|term| words.iter().filter(|word| word == term).count() as f32)
        .collect();
    vector.push(1.0);
    vector
}

/// Language model that records every request.
///
/// Search-query requests are answered with the follow-up question itself.
/// Answer requests echo the context block from the system prompt.
#[derive(Default)]
pub struct ScriptedModel {
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(messages.to_vec());

        match messages.first() {
            Some(first) if first.role == Role::System => {
                let context = first
                    .content
                    .split("--------------\n\n")
                    .nth(1)
                    .unwrap_or_default();
                Ok(format!("From the context: {context}"))
            }
            Some(first) => {
                let question = first
                    .content
                    .rsplit("Follow up question: ")
                    .next()
                    .unwrap_or_default();
                Ok(format!("  {question}\n"))
            }
            None => Err(LlmError::InvalidMessages("empty request".into()).into()),
        }
    }
}

/// Language model that always fails.
pub struct UnavailableModel;

#[async_trait]
impl LanguageModel for UnavailableModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(LlmError::CompletionFailed("rate limit exceeded".into()).into())
    }
}
