//! File read tool: read a text file inside the workspace.

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;

use crate::args::{flag, optional_usize, required_str};
use crate::text::{floor_char_boundary, looks_binary};

pub struct FileReadTool {
    max_bytes: usize,
}

impl FileReadTool {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace. Use offset/limit to read a window of lines \
         in large files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path relative to the workspace root"},
                "offset": {"type": "integer", "description": "1-based line to start from"},
                "limit": {"type": "integer", "description": "Maximum number of lines to return"},
                "line_numbers": {"type": "boolean", "description": "Prefix each line with its number (default false)"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let requested = required_str(&input, "path")?;
        let path = resolve_in_workspace(ctx.workspace(), requested)?;

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ToolError::NotFound(format!("file not found: {requested}")))?;
        if meta.is_dir() {
            return Err(ToolError::InvalidArguments(format!(
                "{requested} is a directory; use file_list"
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        if looks_binary(&bytes) {
            return Err(ToolError::ExecutionFailed(format!(
                "{} looks like a binary file ({} bytes)",
                relative_display(ctx.workspace(), &path),
                bytes.len()
            )));
        }
        let text = String::from_utf8_lossy(&bytes);

        let offset = optional_usize(&input, "offset").unwrap_or(1).max(1);
        let limit = optional_usize(&input, "limit");
        let numbered = flag(&input, "line_numbers");

        let windowed = offset > 1 || limit.is_some();
        let total_lines = text.lines().count();
        let mut out = String::new();
        for (i, line) in text
            .lines()
            .enumerate()
            .skip(offset - 1)
            .take(limit.unwrap_or(usize::MAX))
        {
            if numbered {
                out.push_str(&format!("{:>6}\t", i + 1));
            }
            out.push_str(line);
            out.push('\n');
        }
        if !windowed && !numbered {
            out = text.into_owned();
        }

        if out.len() > self.max_bytes {
            let cut = floor_char_boundary(&out, self.max_bytes);
            out.truncate(cut);
            out.push_str(&format!(
                "\n[truncated at {} bytes; use offset/limit to read more]",
                self.max_bytes
            ));
        } else if windowed {
            let shown_end = (offset - 1 + limit.unwrap_or(total_lines)).min(total_lines);
            if shown_end < total_lines {
                out.push_str(&format!("[lines {offset}-{shown_end} of {total_lines}]"));
            }
        }
        Ok(out)
    }
}
