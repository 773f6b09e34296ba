//! Answer generator trait and prompt construction.

use async_trait::async_trait;

use crate::error::GenerationError;

/// System prompt used when the configuration does not override it.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an internal knowledge assistant. Answer clearly and helpfully.";

/// Produces natural-language text from a system and a user prompt.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o"`).
    fn model_name(&self) -> &str;

    /// Generate a completion.
    ///
    /// Implementations must reject empty prompts with
    /// [`GenerationError::InvalidPrompt`] before contacting any backend;
    /// [`validate_prompts`] does that check.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, GenerationError>;
}

/// Reject empty or whitespace-only prompts.
pub fn validate_prompts(system_prompt: &str, user_prompt: &str) -> Result<(), GenerationError> {
    if system_prompt.trim().is_empty() {
        return Err(GenerationError::InvalidPrompt(
            "system prompt must not be empty".to_string(),
        ));
    }
    if user_prompt.trim().is_empty() {
        return Err(GenerationError::InvalidPrompt(
            "user prompt must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build the user prompt that pairs a context document with a question.
pub fn build_prompt(document: &str, question: &str) -> String {
    format!(
        "Use the following document to answer the question. \n\nDocument:\n{}\n\nQuestion:\n{}",
        document, question
    )
}
