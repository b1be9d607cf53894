//! In-memory `MemoryStore` with keyword scoring.
//!
//! Entries live for the life of the process, partitioned by namespace.

use std::collections::HashMap;
use std::sync::Arc;

use alin_core::{MemoryEntry, MemoryError, MemoryStore};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct InMemoryMemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<MemoryEntry>>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Term hits in content and tags, damped by content length.
fn score(entry: &MemoryEntry, query_terms: &[String]) -> f32 {
    let content = entry.content.to_lowercase();
    let hits: usize = query_terms
        .iter()
        .map(|t| {
            let tag_hit = entry.tags.iter().any(|tag| tag.eq_ignore_ascii_case(t));
            content.matches(t.as_str()).count() + usize::from(tag_hit) * 2
        })
        .sum();
    hits as f32 / (content.len() as f32 / 100.0).max(1.0)
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn store(&self, namespace: &str, content: String, tags: Vec<String>) -> Result<MemoryEntry, MemoryError> {
        if content.trim().is_empty() {
            return Err(MemoryError::Storage("memory content is empty".into()));
        }
        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            content,
            tags,
            created_at: Utc::now(),
            score: 0.0,
        };
        self.entries
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn recall(&self, namespace: &str, query: &str, limit: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        let entries = self.entries.read().await;
        let Some(entries) = entries.get(namespace) else {
            return Ok(Vec::new());
        };

        let query_terms = terms(query);
        let mut results: Vec<MemoryEntry> = if query_terms.is_empty() {
            // No terms: most recent first.
            entries.iter().rev().cloned().collect()
        } else {
            let mut scored: Vec<MemoryEntry> = entries
                .iter()
                .map(|e| MemoryEntry {
                    score: score(e, &query_terms),
                    ..e.clone()
                })
                .filter(|e| e.score > 0.0)
                .collect();
            scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(b.created_at.cmp(&a.created_at)));
            scored
        };
        results.truncate(limit);
        Ok(results)
    }
}
