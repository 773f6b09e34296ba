//! Answer generation providers.
//!
//! Concrete [`AnswerGenerator`] implementations:
//! - **[`DisabledGenerator`]**: returns errors; used when generation is not configured.
//! - **[`OpenAIGenerator`]**: OpenAI chat completions (`/v1/chat/completions`).
//! - **[`OllamaGenerator`]**: Ollama chat (`/api/chat`, non-streaming).
//!
//! Both HTTP providers share the retry strategy in [`upstream`](crate::upstream).

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use knowledge_assistant_core::generation::{validate_prompts, AnswerGenerator};
use knowledge_assistant_core::GenerationError;

use crate::config::GenerationConfig;
use crate::upstream;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// A generator that always fails with [`GenerationError::Disabled`].
pub struct DisabledGenerator;

#[async_trait]
impl AnswerGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        validate_prompts(system_prompt, user_prompt)?;
        Err(GenerationError::Disabled)
    }
}

/// Chat-completion generator against the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            url: upstream::base_url(config.url.as_deref(), OPENAI_DEFAULT_URL),
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: upstream::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        validate_prompts(system_prompt, user_prompt)?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, user_prompt),
            "temperature": self.temperature,
        });
        let json = upstream::post_json(
            &self.client,
            "OpenAI",
            &format!("{}/v1/chat/completions", self.url),
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| GenerationError::Upstream(format!("{:#}", e)))?;

        parse_openai_reply(&json).map_err(|e| GenerationError::Upstream(e.to_string()))
    }
}

/// Chat generator against a local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;

        Ok(Self {
            model,
            url: upstream::base_url(config.url.as_deref(), OLLAMA_DEFAULT_URL),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: upstream::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        validate_prompts(system_prompt, user_prompt)?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, user_prompt),
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let json = upstream::post_json(
            &self.client,
            "Ollama",
            &format!("{}/api/chat", self.url),
            None,
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| GenerationError::Upstream(format!("{:#}", e)))?;

        parse_ollama_reply(&json).map_err(|e| GenerationError::Upstream(e.to_string()))
    }
}

fn chat_messages(system_prompt: &str, user_prompt: &str) -> serde_json::Value {
    serde_json::json!([
        {"role": "system", "content": system_prompt},
        {"role": "user", "content": user_prompt},
    ])
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_openai_reply(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content")
        })?;
    Ok(content.trim().to_string())
}

/// Extract `message.content`, trimmed.
fn parse_ollama_reply(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))?;
    Ok(content.trim().to_string())
}

/// Create the appropriate [`AnswerGenerator`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
