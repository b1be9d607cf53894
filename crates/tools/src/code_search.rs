//! Regex / literal search over workspace text files.

use std::path::Path;

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;
use regex_lite::{Regex, RegexBuilder};

use crate::args::{flag, optional_str, optional_usize, required_str};
use crate::text::looks_binary;
use crate::walk::walker;

/// Matched lines longer than this are cut in the output.
const MAX_LINE_CHARS: usize = 300;

pub struct CodeSearchTool {
    max_matches: usize,
}

impl CodeSearchTool {
    pub fn new(max_matches: usize) -> Self {
        Self { max_matches }
    }
}

/// Build the matcher for a search request.
pub fn build_matcher(pattern: &str, literal: bool, case_insensitive: bool) -> Result<Regex, ToolError> {
    let source = if literal {
        regex_lite::escape(pattern)
    } else {
        pattern.to_string()
    };
    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| ToolError::InvalidArguments(format!("invalid regex: {e}")))
}

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &str {
        "code_search"
    }

    fn description(&self) -> &str {
        "Search workspace files for a regex (or literal text) and return matching lines as \
         path:line: text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex, or plain text when literal is true"},
                "path": {"type": "string", "description": "Directory to search (default '.')"},
                "literal": {"type": "boolean", "description": "Treat pattern as plain text"},
                "case_insensitive": {"type": "boolean"},
                "extensions": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Only search files with these extensions, e.g. [\"rs\", \"toml\"]"
                },
                "max_results": {"type": "integer", "description": "Maximum matches to return"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let pattern = required_str(&input, "pattern")?;
        let requested = optional_str(&input, "path").unwrap_or(".");
        let dir = resolve_in_workspace(ctx.workspace(), requested)?;
        if !dir.exists() {
            return Err(ToolError::NotFound(format!("path not found: {requested}")));
        }

        let matcher = build_matcher(pattern, flag(&input, "literal"), flag(&input, "case_insensitive"))?;
        let extensions: Vec<String> = input["extensions"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default();
        let limit = optional_usize(&input, "max_results")
            .unwrap_or(self.max_matches)
            .clamp(1, self.max_matches);
        let root = ctx.workspace().to_path_buf();

        tokio::task::spawn_blocking(move || Ok(search(&root, &dir, &matcher, &extensions, limit)))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {e}")))?
    }
}

fn search(root: &Path, dir: &Path, matcher: &Regex, extensions: &[String], limit: usize) -> String {
    let mut lines = Vec::new();
    let mut truncated = false;

    'files: for entry in walker(dir, None).flatten() {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !extensions.is_empty() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            if !extensions.contains(&ext) {
                continue;
            }
        }
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        if looks_binary(&bytes) {
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        let shown = relative_display(root, path);
        for (n, line) in text.lines().enumerate() {
            if !matcher.is_match(line) {
                continue;
            }
            if lines.len() == limit {
                truncated = true;
                break 'files;
            }
            let line = match line.char_indices().nth(MAX_LINE_CHARS) {
                Some((cut, _)) => format!("{}...", &line[..cut]),
                None => line.to_string(),
            };
            lines.push(format!("{shown}:{}: {}", n + 1, line.trim_end()));
        }
    }

    if lines.is_empty() {
        return "No matches found".into();
    }
    let mut out = lines.join("\n");
    if truncated {
        out.push_str(&format!("\n[stopped after {limit} matches]"));
    }
    out
}
