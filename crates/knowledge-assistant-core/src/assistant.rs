//! Upload and question-answering pipeline.
//!
//! [`KnowledgeAssistant`] operates entirely through the collaborator
//! traits. The calling application constructs the concrete embedder,
//! store and generator and passes them in; tests use fakes.
//!
//! # Ask Flow
//!
//! 1. Embed the question.
//! 2. Snapshot the store with [`DocumentStore::list_all`].
//! 3. Select context with [`select_context`].
//! 4. `Usable` → build the prompt and call the generator; any other
//!    decision → canned answer, generator not called.

use std::sync::Arc;

use serde::Serialize;

use crate::embedding::{validate_vector, Embedder};
use crate::error::AssistantError;
use crate::generation::{build_prompt, AnswerGenerator, DEFAULT_SYSTEM_PROMPT};
use crate::models::DocumentRecord;
use crate::retrieval::{select_context, Decision, RetrievalPolicy};
use crate::store::DocumentStore;

/// Answer returned when the store holds no documents.
pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents are currently available in the knowledge base.";

/// Answer returned when no stored document is a usable basis.
pub const NO_SUITABLE_DOCUMENT_MESSAGE: &str =
    "It doesn't appear that I can find a suitable document to answer your question.";

/// How an answer was produced.
///
/// `NoConfidentMatch` and `ContentTooShort` produce the same answer text;
/// they are kept apart here for logs and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered { document_id: String, score: f64 },
    NoDocumentsAvailable,
    NoConfidentMatch { score: f64 },
    ContentTooShort { document_id: String, score: f64 },
}

impl AnswerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOutcome::Answered { .. } => "answered",
            AnswerOutcome::NoDocumentsAvailable => "no_documents_available",
            AnswerOutcome::NoConfidentMatch { .. } => "no_confident_match",
            AnswerOutcome::ContentTooShort { .. } => "content_too_short",
        }
    }

    /// Similarity score of the best match, if any document was compared.
    pub fn score(&self) -> Option<f64> {
        match self {
            AnswerOutcome::Answered { score, .. }
            | AnswerOutcome::NoConfidentMatch { score }
            | AnswerOutcome::ContentTooShort { score, .. } => Some(*score),
            AnswerOutcome::NoDocumentsAvailable => None,
        }
    }
}

/// Text shown to the user plus how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    #[serde(flatten)]
    pub outcome: AnswerOutcome,
}

/// The knowledge assistant: embedder + store + generator + policy.
pub struct KnowledgeAssistant {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn AnswerGenerator>,
    policy: RetrievalPolicy,
    system_prompt: String,
}

impl KnowledgeAssistant {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn AnswerGenerator>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            policy,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the default system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Embed `content` and store it as a new document owned by `owner`.
    pub async fn upload(
        &self,
        content: &str,
        owner: Option<&str>,
    ) -> Result<DocumentRecord, AssistantError> {
        if content.trim().is_empty() {
            return Err(AssistantError::InvalidInput(
                "document content must not be empty".to_string(),
            ));
        }

        let vector = self.embed_checked(content).await?;
        let doc = DocumentRecord::new(content, vector, owner.map(str::to_string));
        self.store.insert(&doc).await?;

        tracing::info!(
            document_id = %doc.id,
            owner = doc.owner.as_deref().unwrap_or("-"),
            chars = doc.content.chars().count(),
            "document stored"
        );

        Ok(doc)
    }

    /// Answer `question` from the best-matching stored document.
    pub async fn ask(&self, question: &str) -> Result<Answer, AssistantError> {
        if question.trim().is_empty() {
            return Err(AssistantError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let query = self.embed_checked(question).await?;
        let candidates = self.store.list_all().await?;
        let selection = select_context(&query, &candidates, &self.policy)?;

        let answer = match selection.decision {
            Decision::NoDocumentsAvailable => Answer {
                text: NO_DOCUMENTS_MESSAGE.to_string(),
                outcome: AnswerOutcome::NoDocumentsAvailable,
            },
            Decision::NoConfidentMatch => Answer {
                text: NO_SUITABLE_DOCUMENT_MESSAGE.to_string(),
                outcome: AnswerOutcome::NoConfidentMatch {
                    score: selection.score,
                },
            },
            Decision::ContentTooShort => Answer {
                text: NO_SUITABLE_DOCUMENT_MESSAGE.to_string(),
                outcome: AnswerOutcome::ContentTooShort {
                    document_id: selection
                        .best
                        .map(|d| d.id.clone())
                        .unwrap_or_default(),
                    score: selection.score,
                },
            },
            Decision::Usable(doc) => {
                let prompt = build_prompt(&doc.content, question);
                let text = self.generator.complete(&self.system_prompt, &prompt).await?;
                Answer {
                    text,
                    outcome: AnswerOutcome::Answered {
                        document_id: doc.id.clone(),
                        score: selection.score,
                    },
                }
            }
        };

        tracing::info!(
            outcome = answer.outcome.as_str(),
            score = ?answer.outcome.score(),
            candidates = candidates.len(),
            "question handled"
        );

        Ok(answer)
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, AssistantError> {
        let vector = self.embedder.embed(text).await?;
        validate_vector(&vector, self.embedder.dims())?;
        Ok(vector)
    }
}
