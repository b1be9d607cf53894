//! Git verb allow-list.
//!
//! Stricter than the shell deny-list: the first argument must be a known
//! verb, and no global options (`-C`, `-c`, `--git-dir`) may precede it.
//! After the verb, options that point git at another repository, an output
//! file or a helper program are refused, and path-like values must stay
//! inside the workspace.

use std::path::Path;

use alin_core::ToolError;

use crate::command::CommandPolicy;
use crate::path::resolve_in_workspace;

const READ_VERBS: &[&str] = &[
    "status", "diff", "log", "show", "branch", "blame", "ls-files", "rev-parse", "remote", "tag",
    "shortlog", "describe", "grep",
];

const WRITE_VERBS: &[&str] = &[
    "add", "commit", "checkout", "switch", "restore", "reset", "stash", "merge", "pull", "push",
    "fetch", "init", "mv", "rm", "clone",
];

/// Long options that redirect git outside the workspace or run a program.
const REDIRECTING_OPTIONS: &[&str] = &[
    "--git-dir",
    "--work-tree",
    "--separate-git-dir",
    "--template",
    "--output",
    "--no-index",
    "--upload-pack",
    "--receive-pack",
    "--exec",
    "--config",
    "--open-files-in-pager",
];

/// Options whose value is free text rather than a path.
const TEXT_OPTIONS: &[&str] = &["-m", "--message", "-e", "--grep", "--author", "--committer"];

/// Transports that read local files or spawn commands.
const LOCAL_TRANSPORTS: &[&str] = &["ext::", "fd::", "file:"];

/// An allowed git operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitVerb {
    pub name: &'static str,
    /// Whether the verb can modify the repository or the remote.
    pub writes: bool,
}

impl GitVerb {
    pub fn lookup(verb: &str) -> Option<Self> {
        if let Some(name) = READ_VERBS.iter().find(|v| **v == verb) {
            return Some(Self { name, writes: false });
        }
        WRITE_VERBS
            .iter()
            .find(|v| **v == verb)
            .map(|name| Self { name, writes: true })
    }
}

/// Validate a git argument vector (without the leading `git`) for a run
/// inside `workspace`.
pub fn check_git_args(args: &[String], workspace: &Path) -> Result<GitVerb, ToolError> {
    let Some(first) = args.first() else {
        return Err(ToolError::InvalidArguments("git requires a verb, e.g. [\"status\"]".into()));
    };

    let verb = GitVerb::lookup(first).ok_or_else(|| ToolError::GitOperationBlocked {
        verb: first.clone(),
    })?;

    let mut free_text_next = false;
    for arg in &args[1..] {
        if std::mem::take(&mut free_text_next) {
            continue;
        }
        if let Some(long) = arg.strip_prefix("--") {
            let (name, value) = match long.split_once('=') {
                Some((name, value)) => (format!("--{name}"), Some(value)),
                None => (arg.clone(), None),
            };
            if REDIRECTING_OPTIONS.contains(&name.as_str()) {
                return Err(blocked(verb, &name));
            }
            if TEXT_OPTIONS.contains(&name.as_str()) {
                free_text_next = value.is_none();
                continue;
            }
            if let Some(value) = value {
                check_value(verb, value, workspace)?;
            }
        } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
            check_short_options(verb, short)?;
            free_text_next = TEXT_OPTIONS.contains(&arg.as_str());
        } else {
            check_value(verb, arg, workspace)?;
        }
    }

    let line = format!("git {}", args.join(" "));
    CommandPolicy.check(&line)?;
    Ok(verb)
}

fn blocked(verb: GitVerb, option: &str) -> ToolError {
    ToolError::GitOperationBlocked {
        verb: format!("{} {option}", verb.name),
    }
}

/// Short option clusters that set config or run helpers.
fn check_short_options(verb: GitVerb, cluster: &str) -> Result<(), ToolError> {
    let forbidden: &[char] = match verb.name {
        // -c sets config (core.sshCommand), -u names the upload-pack program
        "clone" => &['c', 'u'],
        // -O opens matches in a pager command
        "grep" => &['O'],
        _ => &[],
    };
    match cluster.chars().find(|c| forbidden.contains(c)) {
        Some(flag) => Err(blocked(verb, &format!("-{flag}"))),
        None => Ok(()),
    }
}

/// Positional values and `--opt=value` values: local transports are refused
/// and anything path-like must resolve inside the workspace.
fn check_value(verb: GitVerb, value: &str, workspace: &Path) -> Result<(), ToolError> {
    let lower = value.to_ascii_lowercase();
    if let Some(transport) = LOCAL_TRANSPORTS.iter().find(|t| lower.starts_with(**t)) {
        return Err(blocked(verb, transport));
    }

    let unified = value.replace('\\', "/");
    let traversal = || ToolError::PathTraversal {
        path: value.to_string(),
    };
    if unified.starts_with('~') {
        return Err(traversal());
    }
    if unified.starts_with('/') || Path::new(value).is_absolute() {
        let canonical = workspace.canonicalize().unwrap_or_else(|_| workspace.to_path_buf());
        let under_root = Path::new(&unified).starts_with(workspace) || Path::new(&unified).starts_with(&canonical);
        if !under_root || escapes_lexically(&unified) || resolve_in_workspace(workspace, value).is_err() {
            return Err(traversal());
        }
        return Ok(());
    }
    if escapes_lexically(&unified) {
        return Err(traversal());
    }
    Ok(())
}

/// Whether `..` segments climb above the starting directory at any point.
fn escapes_lexically(path: &str) -> bool {
    let mut depth: i64 = 0;
    for segment in path.split('/') {
        match segment {
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            "" | "." => {}
            _ => depth += 1,
        }
    }
    false
}
