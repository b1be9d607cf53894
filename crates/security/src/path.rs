//! Path confinement: every filesystem tool resolves through here.
//!
//! The caller-supplied path is normalized (root prefixes, `.` and `..`
//! segments stripped), joined to the workspace root, and the longest
//! existing ancestor is canonicalized so symlinks are followed. The
//! authoritative check is the prefix comparison of that *resolved* path
//! against the canonical root; normalization alone is not trusted.

use std::path::{Component, Path, PathBuf};

use alin_core::ToolError;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

impl From<PathValidationError> for ToolError {
    fn from(err: PathValidationError) -> Self {
        match err {
            PathValidationError::PathTraversal { path } => ToolError::PathTraversal { path },
            PathValidationError::CanonicalizeFailed { path, .. } => ToolError::PathTraversal { path },
        }
    }
}

/// Resolve `requested` inside `root`.
///
/// Returns an absolute path that is guaranteed (at the time of the call) to
/// lie within the canonical workspace root. The target itself need not
/// exist, so the same check serves reads and writes.
pub fn resolve_in_workspace(root: &Path, requested: &str) -> Result<PathBuf, PathValidationError> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let unified = requested.replace('\\', "/");
    let relative = strip_root_prefix(&unified, root, &canonical_root);
    let joined = canonical_root.join(normalize(relative));

    // Walk up to the deepest ancestor that exists (as a link or a file) and
    // canonicalize that; the rest is re-appended verbatim.
    let mut existing = joined.as_path();
    let mut rest: Vec<&std::ffi::OsStr> = Vec::new();
    while existing.symlink_metadata().is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|_| PathValidationError::PathTraversal {
            path: requested.to_string(),
        })?;
    for name in rest.iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(&canonical_root) {
        tracing::warn!(requested, resolved = %resolved.display(), "Path escapes workspace");
        return Err(PathValidationError::PathTraversal {
            path: requested.to_string(),
        });
    }

    Ok(resolved)
}

/// Absolute paths that already point into the workspace are made relative;
/// any other root or drive prefix is dropped by `normalize`.
fn strip_root_prefix<'a>(requested: &'a str, root: &Path, canonical_root: &Path) -> &'a str {
    for candidate in [canonical_root, root] {
        let prefix = candidate.to_string_lossy().replace('\\', "/");
        if prefix.is_empty() {
            continue;
        }
        if let Some(rest) = requested.strip_prefix(prefix.as_str())
            && (rest.is_empty() || rest.starts_with('/'))
        {
            return rest;
        }
    }
    requested
}

/// Keep only normal segments.
fn normalize(requested: &str) -> PathBuf {
    Path::new(requested)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            Component::Prefix(_) | Component::RootDir | Component::CurDir | Component::ParentDir => None,
        })
        .collect()
}

/// Render `path` relative to `root` for tool output, `.` for the root itself.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    match path.strip_prefix(&canonical_root).or_else(|_| path.strip_prefix(root)) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        dir
    }

    fn inside(dir: &tempfile::TempDir, p: &Path) -> bool {
        p.starts_with(dir.path().canonicalize().unwrap())
    }

    #[test]
    fn plain_relative_path_resolves() {
        let ws = workspace();
        let p = resolve_in_workspace(ws.path(), "src/main.rs").unwrap();
        assert!(inside(&ws, &p));
        assert!(p.ends_with("src/main.rs"));
    }

    #[test]
    fn nonexistent_target_resolves_for_writes() {
        let ws = workspace();
        let p = resolve_in_workspace(ws.path(), "new/dir/file.txt").unwrap();
        assert!(inside(&ws, &p));
        assert!(p.ends_with("new/dir/file.txt"));
    }

    #[test]
    fn parent_segments_are_confined() {
        let ws = workspace();
        for requested in ["../../etc/passwd", "a/../../b", "./../..", "..\\..\\windows"] {
            match resolve_in_workspace(ws.path(), requested) {
                Ok(p) => assert!(inside(&ws, &p), "{requested} escaped to {}", p.display()),
                Err(PathValidationError::PathTraversal { .. }) => {}
                Err(other) => panic!("unexpected error for {requested}: {other}"),
            }
        }
        let p = resolve_in_workspace(ws.path(), "../../etc/passwd").unwrap();
        assert!(p.ends_with("etc/passwd"));
    }

    #[test]
    fn absolute_paths_are_confined() {
        let ws = workspace();
        let p = resolve_in_workspace(ws.path(), "/etc/passwd").unwrap();
        assert!(inside(&ws, &p));

        let abs_inside = ws.path().join("src/main.rs");
        let p = resolve_in_workspace(ws.path(), &abs_inside.to_string_lossy()).unwrap();
        assert_eq!(p, ws.path().canonicalize().unwrap().join("src/main.rs"));
    }

    #[test]
    fn root_itself_resolves() {
        let ws = workspace();
        let p = resolve_in_workspace(ws.path(), ".").unwrap();
        assert_eq!(p, ws.path().canonicalize().unwrap());
        assert_eq!(relative_display(ws.path(), &p), ".");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let ws = workspace();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cr3t").unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.path().join("link")).unwrap();

        let err = resolve_in_workspace(ws.path(), "link/secret.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::PathTraversal { .. }));

        // Writing a new file through the link is also refused.
        let err = resolve_in_workspace(ws.path(), "link/new.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::PathTraversal { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_rejected() {
        let ws = workspace();
        std::os::unix::fs::symlink("/nonexistent/target", ws.path().join("dangling")).unwrap();
        assert!(resolve_in_workspace(ws.path(), "dangling").is_err());
    }

    #[test]
    fn converts_into_tool_error() {
        let err: ToolError = PathValidationError::PathTraversal { path: "../x".into() }.into();
        assert_eq!(err.kind(), "path_traversal");
    }
}
