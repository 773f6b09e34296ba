//! Storage abstraction for Knowledge Assistant.
//!
//! The [`DocumentStore`] trait is everything the assistant pipeline needs
//! from persistence, enabling pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentRecord;

/// Durable mapping from document id to [`DocumentRecord`].
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](DocumentStore::insert) | Store a new document |
/// | [`list_all`](DocumentStore::list_all) | Snapshot every document, in insertion order |
/// | [`count`](DocumentStore::count) | Number of stored documents |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document. Ids are unique; inserting an existing id fails.
    async fn insert(&self, doc: &DocumentRecord) -> Result<()>;

    /// Return an owned snapshot of every stored document.
    ///
    /// May be empty. Backends return insertion order, but callers must not
    /// rely on the order being stable across calls.
    async fn list_all(&self) -> Result<Vec<DocumentRecord>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize>;
}
