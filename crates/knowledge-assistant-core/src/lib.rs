//! # Knowledge Assistant Core
//!
//! Shared logic for Knowledge Assistant: the document model, the
//! retrieval core (cosine similarity, best-match scan, answerability
//! policy), the collaborator traits (embedder, document store, answer
//! generator) and the upload/ask pipeline that wires them together.
//!
//! This crate contains no tokio, sqlx, HTTP clients or filesystem I/O.
//! Concrete providers and the SQLite store live in the
//! `knowledge-assistant` app crate.

pub mod assistant;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod retrieval;
pub mod store;

pub use assistant::{Answer, AnswerOutcome, KnowledgeAssistant};
pub use error::{AssistantError, EmbeddingError, GenerationError, RetrievalError};
pub use models::DocumentRecord;
pub use retrieval::{Decision, RetrievalPolicy};
