//! Workspace lifecycle: create on first use, single owner, idle reaping.
//!
//! Each workspace is a directory `<root>/<id>`. The registry holding the
//! entries is injected; [`InMemoryWorkspaceRegistry`] is the default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alin_core::{ToolContext, WorkspaceEntry, WorkspaceError, WorkspaceRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_ID_LEN: usize = 64;

#[derive(Default, Clone)]
pub struct InMemoryWorkspaceRegistry {
    entries: Arc<RwLock<HashMap<String, WorkspaceEntry>>>,
}

impl InMemoryWorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceRegistry for InMemoryWorkspaceRegistry {
    async fn get(&self, id: &str) -> Result<Option<WorkspaceEntry>, WorkspaceError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(&self, entry: WorkspaceEntry) -> Result<(), WorkspaceError> {
        self.entries.write().await.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn evict(&self, id: &str) -> Result<Option<WorkspaceEntry>, WorkspaceError> {
        Ok(self.entries.write().await.remove(id))
    }

    async fn list(&self) -> Result<Vec<WorkspaceEntry>, WorkspaceError> {
        Ok(self.entries.read().await.values().cloned().collect())
    }
}

/// Ids become directory names, so only `[A-Za-z0-9_-]{1,64}` is accepted.
pub fn validate_workspace_id(id: &str) -> Result<(), WorkspaceError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidId(id.to_string()))
    }
}

pub struct Workspaces {
    root: PathBuf,
    ttl: Duration,
    registry: Arc<dyn WorkspaceRegistry>,
}

impl Workspaces {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, registry: Arc<dyn WorkspaceRegistry>) -> Self {
        Self {
            root: root.into(),
            ttl,
            registry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open `id` for `owner`, creating it on first use. Touches `last_used`.
    pub async fn open(&self, id: &str, owner: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        validate_workspace_id(id)?;

        let entry = match self.registry.get(id).await? {
            Some(existing) if existing.owner != owner => {
                warn!(workspace = id, "Workspace owner mismatch");
                return Err(WorkspaceError::OwnerMismatch { id: id.to_string() });
            }
            Some(mut existing) => {
                tokio::fs::create_dir_all(&existing.root).await?;
                existing.last_used = Utc::now();
                existing
            }
            None => {
                let dir = self.root.join(id);
                tokio::fs::create_dir_all(&dir).await?;
                let root = tokio::fs::canonicalize(&dir).await?;
                info!(workspace = id, owner, path = %root.display(), "Created workspace");
                WorkspaceEntry::new(id, owner, root)
            }
        };
        self.registry.put(entry.clone()).await?;
        Ok(entry)
    }

    /// Create a workspace under a fresh id.
    pub async fn create(&self, owner: &str) -> Result<WorkspaceEntry, WorkspaceError> {
        let id = format!("ws_{}", uuid::Uuid::new_v4().simple());
        self.open(&id, owner).await
    }

    /// Forget the workspace and remove its directory.
    pub async fn delete(&self, id: &str) -> Result<(), WorkspaceError> {
        validate_workspace_id(id)?;
        let entry = self
            .registry
            .evict(id)
            .await?
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        remove_dir(&entry.root).await?;
        info!(workspace = id, "Deleted workspace");
        Ok(())
    }

    /// Evict and remove every workspace idle longer than the TTL.
    pub async fn reap_idle(&self, now: DateTime<Utc>) -> Result<Vec<String>, WorkspaceError> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let mut reaped = Vec::new();
        for entry in self.registry.list().await? {
            if entry.idle_for(now) <= ttl {
                continue;
            }
            if let Some(evicted) = self.registry.evict(&entry.id).await? {
                if let Err(e) = remove_dir(&evicted.root).await {
                    warn!(workspace = %evicted.id, error = %e, "Failed to remove reaped workspace");
                }
                reaped.push(evicted.id);
            }
        }
        if !reaped.is_empty() {
            info!(count = reaped.len(), "Reaped idle workspaces");
        }
        Ok(reaped)
    }

    /// Periodically reap idle workspaces until `shutdown` fires.
    pub fn spawn_reaper(self: Arc<Self>, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.reap_idle(Utc::now()).await {
                            warn!(error = %e, "Workspace reap failed");
                        }
                    }
                }
            }
            debug!("Workspace reaper stopped");
        })
    }
}

/// Tool context rooted at `entry`, bound to `cancel`.
pub fn tool_context(entry: &WorkspaceEntry, cancel: CancellationToken) -> ToolContext {
    ToolContext::new(entry.root.clone())
        .with_owner(entry.owner.clone())
        .with_cancel(cancel)
}

async fn remove_dir(path: &Path) -> Result<(), WorkspaceError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
