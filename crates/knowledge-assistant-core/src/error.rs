//! Error types shared by the retrieval core and the assistant pipeline.
//!
//! "No documents", "no confident match" and "content too short" are not
//! errors; they are [`Decision`](crate::retrieval::Decision)s. The types
//! here cover malformed input and collaborator failures only.

use thiserror::Error;

/// Failure inside the retrieval core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// Two vectors of different length were compared.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure reported by an [`Embedder`](crate::embedding::Embedder).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EmbeddingError {
    /// No embedding provider is configured.
    #[error("embedding provider is disabled")]
    Disabled,

    /// The text to embed was empty.
    #[error("text to embed must not be empty")]
    EmptyInput,

    /// The provider returned a vector of the wrong length.
    #[error("embedding provider returned {actual} dimensions, expected {expected}")]
    UnexpectedDimensions { expected: usize, actual: usize },

    /// The provider returned NaN or an infinite component.
    #[error("embedding provider returned a non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    /// Rate limit, network failure, bad response, or rejected input.
    #[error("embedding provider error: {0}")]
    Upstream(String),
}

/// Failure reported by an [`AnswerGenerator`](crate::generation::AnswerGenerator).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GenerationError {
    /// No generation provider is configured.
    #[error("answer generator is disabled")]
    Disabled,

    /// The system or user prompt was empty.
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    /// Rate limit, network failure, or bad response.
    #[error("answer generator error: {0}")]
    Upstream(String),
}

/// Failure of a [`KnowledgeAssistant`](crate::assistant::KnowledgeAssistant) operation.
#[derive(Error, Debug)]
pub enum AssistantError {
    /// The caller supplied unusable input (empty content or question).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The document store failed to read or write.
    #[error("document store error: {0:#}")]
    Store(#[from] anyhow::Error),
}
