//! Prompt templates rendered with minijinja.

use crate::error::{LlmError, Result};
use minijinja::{Environment, context};

const ANSWER_SYSTEM: &str = "answer_system";
const SEARCH_QUERY: &str = "search_query";

/// Fixed prompt templates for the query pipeline.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(ANSWER_SYSTEM, include_str!("../prompts/answer_system.md.j2"))
            .map_err(template_error)?;
        env.add_template(SEARCH_QUERY, include_str!("../prompts/search_query.md.j2"))
            .map_err(template_error)?;
        Ok(Self { env })
    }

    /// System instruction carrying the context block and the rule to admit
    /// ignorance instead of inventing an answer.
    pub fn render_answer_system(&self, context: &str) -> Result<String> {
        self.env
            .get_template(ANSWER_SYSTEM)
            .and_then(|template| template.render(context! { context }))
            .map_err(template_error)
    }

    /// Instruction asking the model to fold history and question into one
    /// standalone search query.
    pub fn render_search_query(&self, chat_history: &str, question: &str) -> Result<String> {
        self.env
            .get_template(SEARCH_QUERY)
            .and_then(|template| template.render(context! { chat_history, question }))
            .map_err(template_error)
    }
}

fn template_error(error: minijinja::Error) -> crate::Error {
    LlmError::InvalidMessages(format!("prompt template: {error}")).into()
}
