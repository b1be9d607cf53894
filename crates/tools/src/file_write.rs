//! File write tool: create or overwrite a file inside the workspace.

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;
use tracing::debug;

use crate::args::required_str;

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories as needed. \
         Overwrites the file if it exists."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path relative to the workspace root"},
                "content": {"type": "string", "description": "Full file content"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let requested = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;
        let path = resolve_in_workspace(ctx.workspace(), requested)?;

        if path.is_dir() {
            return Err(ToolError::InvalidArguments(format!("{requested} is a directory")));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content.as_bytes()).await?;

        let shown = relative_display(ctx.workspace(), &path);
        debug!(path = %shown, bytes = content.len(), "Wrote file");
        Ok(format!("Wrote {} bytes to {shown}", content.len()))
    }
}
