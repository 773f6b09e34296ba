//! Assistant wiring and the document/question CLI commands.
//!
//! [`build_assistant`] assembles a [`KnowledgeAssistant`] from configuration:
//! the configured embedder and generator plus a [`SqliteStore`]. The server
//! and every `ka` command that touches documents go through it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use knowledge_assistant_core::store::DocumentStore;
use knowledge_assistant_core::{AnswerOutcome, KnowledgeAssistant};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Characters of content shown per document by `ka documents`.
const PREVIEW_CHARS: usize = 60;

/// Build the assistant over the configured database.
///
/// Migrations are applied first, so a fresh database works without
/// `ka init`. Returns the pool as well so callers can reach other tables.
pub async fn build_assistant(config: &Config) -> Result<(KnowledgeAssistant, SqlitePool)> {
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool.clone(), embedder.model_name());

    let assistant = KnowledgeAssistant::new(
        embedder,
        Arc::new(store),
        generator,
        config.retrieval.policy(),
    )
    .with_system_prompt(config.generation.system_prompt());

    Ok((assistant, pool))
}

/// `ka upload`: store a document given inline or read from a file.
pub async fn run_upload(
    config: &Config,
    text: Option<&str>,
    file: Option<&Path>,
    owner: Option<&str>,
) -> Result<()> {
    let content = match (text, file) {
        (Some(_), Some(_)) => bail!("Pass either TEXT or --file, not both"),
        (Some(text), None) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Nothing to upload: pass TEXT or --file"),
    };

    let (assistant, pool) = build_assistant(config).await?;
    let result = assistant.upload(&content, owner).await;
    pool.close().await;

    let doc = result?;
    println!("Document uploaded successfully!");
    println!("  id: {}", doc.id);
    Ok(())
}

/// `ka ask`: answer a question and optionally explain the decision.
pub async fn run_ask(config: &Config, question: &str, explain: bool) -> Result<()> {
    let (assistant, pool) = build_assistant(config).await?;
    let result = assistant.ask(question).await;
    pool.close().await;

    let answer = result?;
    println!("{}", answer.text);

    if explain {
        println!();
        println!("outcome: {}", answer.outcome.as_str());
        match &answer.outcome {
            AnswerOutcome::Answered { document_id, score }
            | AnswerOutcome::ContentTooShort { document_id, score } => {
                println!("document: {}", document_id);
                println!("score: {:.4}", score);
            }
            AnswerOutcome::NoConfidentMatch { score } => {
                println!("score: {:.4}", score);
            }
            AnswerOutcome::NoDocumentsAvailable => {}
        }
        let policy = assistant.policy();
        println!(
            "policy: threshold {} / min length {}",
            policy.confidence_threshold, policy.min_content_length
        );
    }
    Ok(())
}

/// `ka documents`: list stored documents, oldest first.
pub async fn run_list_documents(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool, config.embedding.model.clone().unwrap_or_default());
    let docs = store.list_all().await?;
    store.pool().close().await;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!("{:<36}  {:<12}  {:<20}  PREVIEW", "ID", "OWNER", "CREATED");
    for doc in &docs {
        println!(
            "{:<36}  {:<12}  {:<20}  {}",
            doc.id,
            doc.owner.as_deref().unwrap_or("-"),
            doc.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            doc.preview(PREVIEW_CHARS).replace('\n', " ")
        );
    }
    println!();
    println!("{} document(s)", docs.len());
    Ok(())
}
