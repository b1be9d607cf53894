//! Workspace walking shared by `scan_directory` and `code_search`.

use std::path::Path;

use ignore::WalkBuilder;

/// Directories never descended into, ignore files or not.
pub(crate) const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// A gitignore-aware walker rooted at `root`. Hidden files are included,
/// `.git`, `node_modules` and `target` are not.
pub(crate) fn walker(root: &Path, max_depth: Option<usize>) -> ignore::Walk {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .max_depth(max_depth)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d))
        })
        .build()
}
