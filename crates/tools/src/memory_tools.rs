//! `memory_store` / `memory_recall` over an injected [`MemoryStore`],
//! namespaced by the workspace owner.

use std::sync::Arc;

use alin_core::{MemoryStore, Tool, ToolContext, ToolError};
use async_trait::async_trait;

use crate::args::{optional_usize, required_str, string_list};

const DEFAULT_RECALL_LIMIT: usize = 5;
const MAX_RECALL_LIMIT: usize = 20;

pub struct MemoryStoreTool {
    store: Arc<dyn MemoryStore>,
}

impl MemoryStoreTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryStoreTool {
    fn name(&self) -> &str {
        "memory_store"
    }

    fn description(&self) -> &str {
        "Save a note for later sessions, e.g. a project convention or a user preference."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "What to remember"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let content = required_str(&input, "content")?;
        let tags = if input.get("tags").is_some() {
            string_list(&input, "tags")?
        } else {
            Vec::new()
        };
        let entry = self
            .store
            .store(&ctx.owner, content.to_string(), tags)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("Stored memory {}", entry.id))
    }
}

pub struct MemoryRecallTool {
    store: Arc<dyn MemoryStore>,
}

impl MemoryRecallTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryRecallTool {
    fn name(&self) -> &str {
        "memory_recall"
    }

    fn description(&self) -> &str {
        "Look up previously saved notes by keyword."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer", "description": "Maximum notes to return (default 5)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(&input, "query")?;
        let limit = optional_usize(&input, "limit")
            .unwrap_or(DEFAULT_RECALL_LIMIT)
            .clamp(1, MAX_RECALL_LIMIT);
        let entries = self
            .store
            .recall(&ctx.owner, query, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        if entries.is_empty() {
            return Ok("No memories found".into());
        }
        let lines: Vec<String> = entries
            .iter()
            .map(|e| {
                let date = e.created_at.format("%Y-%m-%d");
                if e.tags.is_empty() {
                    format!("- ({date}) {}", e.content)
                } else {
                    format!("- ({date}) {} [{}]", e.content, e.tags.join(", "))
                }
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
