//! In-memory [`DocumentStore`] implementation for tests and embedding.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Reads clone the whole vector,
//! so a scan never observes a concurrent insert.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::DocumentRecord;

use super::DocumentStore;

/// In-memory store, owned by whoever constructs it.
pub struct InMemoryStore {
    docs: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Create a store pre-populated with `docs`, in order.
    pub fn with_documents(docs: Vec<DocumentRecord>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, doc: &DocumentRecord) -> Result<()> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        if docs.iter().any(|d| d.id == doc.id) {
            bail!("document already exists: {}", doc.id);
        }
        docs.push(doc.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(docs.clone())
    }

    async fn count(&self) -> Result<usize> {
        let docs = self
            .docs
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_list_preserves_order() {
        let store = InMemoryStore::new();
        let a = DocumentRecord::new("first", vec![1.0], None);
        let b = DocumentRecord::new("second", vec![0.5], Some("alice".into()));
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![a, b]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryStore::new();
        let a = DocumentRecord::new("first", vec![1.0], None);
        store.insert(&a).await.unwrap();
        assert!(store.insert(&a).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let store = InMemoryStore::new();
        store
            .insert(&DocumentRecord::new("one", vec![1.0], None))
            .await
            .unwrap();
        let snapshot = store.list_all().await.unwrap();
        store
            .insert(&DocumentRecord::new("two", vec![1.0], None))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
