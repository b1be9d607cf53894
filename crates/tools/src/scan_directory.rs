//! Recursive tree plus a bounded dump of text file contents.
//!
//! Gives the model a one-shot overview of an unfamiliar directory: the tree
//! first, then as many small text files as fit in the byte budgets.

use std::path::{Path, PathBuf};

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use async_trait::async_trait;

use crate::args::{optional_str, optional_usize};
use crate::text::{floor_char_boundary, looks_binary};
use crate::walk::walker;

pub struct ScanDirectoryTool {
    max_depth: usize,
    file_bytes: usize,
    total_bytes: usize,
}

impl ScanDirectoryTool {
    pub fn new(max_depth: usize, file_bytes: usize, total_bytes: usize) -> Self {
        Self {
            max_depth,
            file_bytes,
            total_bytes,
        }
    }
}

#[async_trait]
impl Tool for ScanDirectoryTool {
    fn name(&self) -> &str {
        "scan_directory"
    }

    fn description(&self) -> &str {
        "Recursively list a directory as a tree and include the contents of small text files. \
         Skips .git, node_modules, target and ignored files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory relative to the workspace root (default '.')"},
                "max_depth": {"type": "integer", "description": "Maximum depth to descend"},
                "include_contents": {"type": "boolean", "description": "Dump text file contents (default true)"}
            }
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let requested = optional_str(&input, "path").unwrap_or(".");
        let dir = resolve_in_workspace(ctx.workspace(), requested)?;
        if !dir.is_dir() {
            return Err(ToolError::NotFound(format!("directory not found: {requested}")));
        }

        let depth = optional_usize(&input, "max_depth")
            .unwrap_or(self.max_depth)
            .min(self.max_depth);
        let include_contents = input["include_contents"].as_bool().unwrap_or(true);
        let root = ctx.workspace().to_path_buf();
        let (file_bytes, total_bytes) = (self.file_bytes, self.total_bytes);

        tokio::task::spawn_blocking(move || scan(&root, &dir, depth, include_contents, file_bytes, total_bytes))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("scan task failed: {e}")))?
    }
}

fn scan(
    root: &Path,
    dir: &Path,
    depth: usize,
    include_contents: bool,
    file_bytes: usize,
    total_bytes: usize,
) -> Result<String, ToolError> {
    let mut tree = String::new();
    let mut files: Vec<PathBuf> = Vec::new();

    for entry in walker(dir, Some(depth)).flatten() {
        let level = entry.depth();
        if level == 0 {
            tree.push_str(&format!("{}/\n", relative_display(root, entry.path())));
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let indent = "  ".repeat(level);
        if entry.file_type().is_some_and(|t| t.is_dir()) {
            tree.push_str(&format!("{indent}{name}/\n"));
        } else {
            tree.push_str(&format!("{indent}{name}\n"));
            files.push(entry.into_path());
        }
    }

    if !include_contents {
        return Ok(tree);
    }

    let mut out = tree;
    let mut used = 0usize;
    let mut skipped = 0usize;
    for path in files {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        if bytes.is_empty() || looks_binary(&bytes) {
            continue;
        }
        if used >= total_bytes {
            skipped += 1;
            continue;
        }
        let text = String::from_utf8_lossy(&bytes);
        let budget = file_bytes.min(total_bytes - used);
        let cut = floor_char_boundary(&text, budget);
        out.push_str(&format!("\n=== {} ===\n", relative_display(root, &path)));
        out.push_str(&text[..cut]);
        if cut < text.len() {
            out.push_str(&format!("\n[... {} more bytes]", text.len() - cut));
        }
        out.push('\n');
        used += cut;
    }
    if skipped > 0 {
        out.push_str(&format!(
            "\n[{skipped} more files not shown; content budget of {total_bytes} bytes reached]\n"
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path();
        std::fs::create_dir_all(p.join("src/nested")).unwrap();
        std::fs::create_dir_all(p.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(p.join("target/debug")).unwrap();
        std::fs::write(p.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
        std::fs::write(p.join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(p.join("src/nested/deep.rs"), "// deep\n").unwrap();
        std::fs::write(p.join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(p.join("target/debug/app"), [0u8, 1, 2]).unwrap();
        std::fs::write(p.join(".gitignore"), "secret.env\n").unwrap();
        std::fs::write(p.join("secret.env"), "TOKEN=1").unwrap();
        dir
    }

    #[tokio::test]
    async fn tree_skips_heavy_and_ignored_dirs() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path());
        let out = ScanDirectoryTool::new(4, 1000, 10_000)
            .execute(json!({"include_contents": false}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("  src/\n"));
        assert!(out.contains("    main.rs\n"));
        assert!(out.contains("      deep.rs\n"));
        assert!(!out.contains("node_modules"));
        assert!(!out.contains("target"));
        assert!(!out.lines().any(|l| l.trim() == "secret.env"));
    }

    #[tokio::test]
    async fn contents_respect_budgets() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path());
        let out = ScanDirectoryTool::new(4, 1000, 10_000).execute(json!({}), &ctx).await.unwrap();
        assert!(out.contains("=== src/main.rs ===\nfn main() {}"));

        let out = ScanDirectoryTool::new(4, 5, 12).execute(json!({}), &ctx).await.unwrap();
        assert!(out.contains("more bytes]"));
        assert!(out.contains("content budget of 12 bytes reached"));
    }

    #[tokio::test]
    async fn depth_is_limited() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path());
        let out = ScanDirectoryTool::new(4, 1000, 10_000)
            .execute(json!({"max_depth": 1, "include_contents": false}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("  src/\n"));
        assert!(!out.contains("main.rs"));
    }
}
