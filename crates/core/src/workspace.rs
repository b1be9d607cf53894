//! Workspace registry: where workspace ids map to directories and owners.
//!
//! The registry is injected so eviction policy can be tested apart from the
//! loop. The core assumes at most one active loop per workspace; the
//! registry does not serialize concurrent requests.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub id: String,
    pub owner: String,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl WorkspaceEntry {
    pub fn new(id: impl Into<String>, owner: impl Into<String>, root: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner: owner.into(),
            root,
            created_at: now,
            last_used: now,
        }
    }

    /// Time since the workspace was last touched.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_used
    }
}

#[async_trait]
pub trait WorkspaceRegistry: Send + Sync {
    async fn get(&self, id: &str) -> std::result::Result<Option<WorkspaceEntry>, WorkspaceError>;

    /// Insert or replace.
    async fn put(&self, entry: WorkspaceEntry) -> std::result::Result<(), WorkspaceError>;

    /// Remove and return the entry, if present.
    async fn evict(&self, id: &str) -> std::result::Result<Option<WorkspaceEntry>, WorkspaceError>;

    async fn list(&self) -> std::result::Result<Vec<WorkspaceEntry>, WorkspaceError>;
}
