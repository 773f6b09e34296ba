//! Core data types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored document together with its embedding.
///
/// Records are created on upload and never updated afterwards. The
/// retrieval core only ever sees borrowed snapshots of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Document UUID.
    pub id: String,
    /// Full document text.
    pub content: String,
    /// Embedding of `content`; its length equals the configured dimensionality.
    #[serde(skip)]
    pub vector: Vec<f32>,
    /// Username of the uploader, if known.
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create a record with a fresh UUID and the current UTC timestamp.
    pub fn new(content: impl Into<String>, vector: Vec<f32>, owner: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            vector,
            owner,
            created_at: Utc::now(),
        }
    }

    /// First `max_chars` characters of the content, for listings.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}
