//! MemoryStore trait: long-lived notes the agent can save and recall.
//!
//! The store itself is an external collaborator; the core only defines the
//! shape of an entry and the two operations the memory tools need. Entries
//! are partitioned by namespace (the workspace owner).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,

    pub content: String,

    /// Tags for categorization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Relevance score (set by recall)
    #[serde(default)]
    pub score: f32,
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist `content` and return the stored entry.
    async fn store(
        &self,
        namespace: &str,
        content: String,
        tags: Vec<String>,
    ) -> std::result::Result<MemoryEntry, MemoryError>;

    /// Best matches for `query`, highest score first.
    async fn recall(
        &self,
        namespace: &str,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;
}
