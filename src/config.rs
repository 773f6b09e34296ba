use anyhow::{Context, Result};
use knowledge_assistant_core::generation::DEFAULT_SYSTEM_PROMPT;
use knowledge_assistant_core::retrieval::{
    RetrievalPolicy, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_CONTENT_LENGTH,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `auth.secret` is not set.
pub const SECRET_ENV_VAR: &str = "KA_SECRET_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override. Defaults to the provider's public endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            system_prompt: None,
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_content_length: default_min_content_length(),
        }
    }
}

impl RetrievalConfig {
    pub fn policy(&self) -> RetrievalPolicy {
        RetrievalPolicy {
            confidence_threshold: self.confidence_threshold,
            min_content_length: self.min_content_length,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_minutes: default_token_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl AuthConfig {
    /// Signing secret from config, falling back to `KA_SECRET_KEY`.
    pub fn resolve_secret(&self) -> Result<String> {
        if let Some(secret) = self.secret.as_ref().filter(|s| !s.is_empty()) {
            return Ok(secret.clone());
        }
        match std::env::var(SECRET_ENV_VAR) {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            _ => anyhow::bail!(
                "no signing secret: set auth.secret or the {} environment variable",
                SECRET_ENV_VAR
            ),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_min_content_length() -> usize {
    DEFAULT_MIN_CONTENT_LENGTH
}
fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_token_ttl() -> i64 {
    60
}
fn default_bcrypt_cost() -> u32 {
    12
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    let threshold = config.retrieval.confidence_threshold;
    if !(-1.0..=1.0).contains(&threshold) {
        anyhow::bail!("retrieval.confidence_threshold must be in [-1.0, 1.0]");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    // Validate auth
    if config.auth.token_ttl_minutes <= 0 {
        anyhow::bail!("auth.token_ttl_minutes must be > 0");
    }
    if !(4..=31).contains(&config.auth.bcrypt_cost) {
        anyhow::bail!("auth.bcrypt_cost must be in [4, 31]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/ka.sqlite\"\n").unwrap();
        assert!(!config.embedding.is_enabled());
        assert!(!config.generation.is_enabled());
        assert_eq!(config.retrieval.confidence_threshold, 0.7);
        assert_eq!(config.retrieval.min_content_length, 20);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.generation.temperature, 0.2);
        assert_eq!(config.generation.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_policy_from_retrieval_section() {
        let config = parse(
            r#"
            [db]
            path = "x.sqlite"
            [retrieval]
            confidence_threshold = 0.85
            min_content_length = 5
            "#,
        )
        .unwrap();
        let policy = config.retrieval.policy();
        assert_eq!(policy.confidence_threshold, 0.85);
        assert_eq!(policy.min_content_length, 5);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [retrieval]
            confidence_threshold = 1.5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn test_enabled_embedding_requires_dims_and_model() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [embedding]
            provider = "openai"
            model = "text-embedding-ada-002"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [embedding]
            provider = "ollama"
            dims = 768
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"
            [generation]
            provider = "llmini"
            model = "tiny"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_generation_needs_model_and_sane_temperature() {
        assert!(parse(
            r#"
            [db]
            path = "x.sqlite"
            [generation]
            provider = "openai"
            "#,
        )
        .is_err());
        assert!(parse(
            r#"
            [db]
            path = "x.sqlite"
            [generation]
            temperature = 3.0
            "#,
        )
        .is_err());
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        assert!(parse("[db]\npath = \"x\"\n[auth]\nbcrypt_cost = 3\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[auth]\nbcrypt_cost = 4\n").is_ok());
    }

    #[test]
    fn test_configured_secret_wins() {
        let auth = AuthConfig {
            secret: Some("from-config".into()),
            ..AuthConfig::default()
        };
        assert_eq!(auth.resolve_secret().unwrap(), "from-config");
    }
}
