//! SQLite-backed [`DocumentStore`].
//!
//! Documents live in the `documents` table created by
//! [`migrate::apply`](crate::migrate::apply). Vectors are stored as
//! little-endian `f32` BLOBs together with their dimensionality and the
//! embedding model that produced them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use knowledge_assistant_core::embedding::{blob_to_vec, vec_to_blob};
use knowledge_assistant_core::store::DocumentStore;
use knowledge_assistant_core::DocumentRecord;
use sqlx::{Row, SqlitePool};

pub struct SqliteStore {
    pool: SqlitePool,
    model: String,
}

impl SqliteStore {
    /// Wrap an open pool. `model` is recorded next to every inserted vector.
    pub fn new(pool: SqlitePool, model: impl Into<String>) -> Self {
        Self {
            pool,
            model: model.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, doc: &DocumentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, content, embedding, dims, model, owner, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.content)
        .bind(vec_to_blob(&doc.vector))
        .bind(doc.vector.len() as i64)
        .bind(&self.model)
        .bind(&doc.owner)
        .bind(doc.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert document {}", doc.id))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, content, embedding, owner, created_at FROM documents \
             ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            let created_at: String = row.get("created_at");
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .with_context(|| format!("Bad created_at on document {}", id))?
                .with_timezone(&Utc);
            docs.push(DocumentRecord {
                content: row.get("content"),
                vector: blob_to_vec(&blob),
                owner: row.get("owner"),
                created_at,
                id,
            });
        }
        Ok(docs)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
