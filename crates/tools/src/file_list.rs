//! Directory listing, one level deep.

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;

use crate::args::optional_str;

pub struct FileListTool;

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory (one level). Directories end with '/', \
         files show their size in bytes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory relative to the workspace root (default '.')"}
            }
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let requested = optional_str(&input, "path").unwrap_or(".");
        let dir = resolve_in_workspace(ctx.workspace(), requested)?;

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|_| ToolError::NotFound(format!("directory not found: {requested}")))?;

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                dirs.push(format!("{name}/"));
            } else {
                let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                let suffix = if file_type.is_symlink() { " -> link" } else { "" };
                files.push(format!("{name} ({size} bytes){suffix}"));
            }
        }
        dirs.sort();
        files.sort();

        let shown = relative_display(ctx.workspace(), &dir);
        if dirs.is_empty() && files.is_empty() {
            return Ok(format!("{shown} is empty"));
        }
        let mut out = format!("{shown}:\n");
        for line in dirs.iter().chain(files.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}
