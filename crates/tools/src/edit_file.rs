//! Exact-match string replacement in a single file.

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;

use crate::args::required_str;

pub struct EditFileTool;

/// Start offsets of every occurrence of `old`, overlapping ones included.
fn occurrences(content: &str, old: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut pos = 0;
    while let Some(found) = content[pos..].find(old) {
        let at = pos + found;
        starts.push(at);
        let step = content[at..].chars().next().map_or(1, char::len_utf8);
        pos = at + step;
    }
    starts
}

/// Replace the single occurrence of `old` in `content`.
pub fn replace_unique(content: &str, old: &str, new: &str) -> Result<String, ToolError> {
    if old.is_empty() {
        return Err(ToolError::InvalidArguments("old_str must not be empty".into()));
    }
    if old == new {
        return Err(ToolError::InvalidArguments("old_str and new_str are identical".into()));
    }
    match occurrences(content, old).as_slice() {
        [] => Err(ToolError::NotFound("old_str was not found in the file".into())),
        [at] => Ok(format!("{}{new}{}", &content[..*at], &content[at + old.len()..])),
        starts => Err(ToolError::AmbiguousMatch {
            occurrences: starts.len(),
        }),
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace one exact occurrence of old_str with new_str in a file. old_str must match \
         exactly once; include surrounding lines to make it unique."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path relative to the workspace root"},
                "old_str": {"type": "string", "description": "Exact text to replace"},
                "new_str": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "old_str", "new_str"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let requested = required_str(&input, "path")?;
        let old = required_str(&input, "old_str")?;
        let new = required_str(&input, "new_str")?;
        let path = resolve_in_workspace(ctx.workspace(), requested)?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| ToolError::NotFound(format!("file not found: {requested}")))?;
        let updated = replace_unique(&content, old, new)?;
        tokio::fs::write(&path, updated.as_bytes()).await?;

        let line = content
            .find(old)
            .map(|at| content[..at].matches('\n').count() + 1)
            .unwrap_or(1);
        Ok(format!(
            "Edited {} at line {line}",
            relative_display(ctx.workspace(), &path)
        ))
    }
}
