//! Command deny-list for `run_command`, `execute_code` and `git`.
//!
//! The literal command text is matched case-insensitively against a fixed
//! set of destructive patterns before any process is spawned. This catches
//! the obvious foot-guns; it does not contain a determined adversary.

use std::sync::LazyLock;

use alin_core::ToolError;
use regex_lite::Regex;

/// A named destructive pattern.
#[derive(Debug)]
pub struct BlockedPattern {
    pub name: &'static str,
    regex: Regex,
}

const PATTERNS: &[(&str, &str)] = &[
    (
        "recursive delete of root or home",
        r"(?i)\brm\s+(?:-\S+\s+)*-\S*r\S*\s+(?:-\S+\s+)*(?:/|/\*|~|~/|~/\*|\$home/?|\$\{home\}/?)(?:\s|;|&|\||$)",
    ),
    ("filesystem format", r"(?i)\bmkfs(?:\.\w+)?\b"),
    ("dd onto a device", r"(?i)\bdd\b[^;&|]*\bof=/dev/"),
    ("fork bomb", r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
    ("shutdown or reboot", r"(?i)\b(?:shutdown|reboot|halt|poweroff)\b"),
    ("runlevel change", r"(?i)\binit\s+[06]\b"),
    (
        "recursive chmod 777 of root",
        r"(?i)\bchmod\s+(?:-\S+\s+)*-\S*r\S*\s+(?:-\S+\s+)*0?777\s+/(?:\s|;|&|\||$)",
    ),
    ("forced git push", r"(?i)\bgit\s+(?:\S+\s+)*push\b[^;&|]*(?:--force\b|\s-f\b|\s\+\S)"),
    ("git reset --hard", r"(?i)\bgit\s+(?:\S+\s+)*reset\b[^;&|]*--hard\b"),
    ("git history rewrite", r"(?i)\bgit\s+(?:\S+\s+)*filter-branch\b"),
    ("raw disk write", r"(?i)>\s*/dev/(?:sd[a-z]|hd[a-z]|nvme\d|xvd[a-z]|vd[a-z]|disk\d|mmcblk\d)"),
];

static DEFAULT_PATTERNS: LazyLock<Vec<BlockedPattern>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(name, re)| BlockedPattern {
            name,
            regex: Regex::new(re).expect("built-in deny pattern must compile"),
        })
        .collect()
});

/// Deny-list check applied to shell text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPolicy;

impl CommandPolicy {
    /// Name of the first pattern `command` matches, if any.
    pub fn first_match(&self, command: &str) -> Option<&'static str> {
        DEFAULT_PATTERNS
            .iter()
            .find(|p| p.regex.is_match(command))
            .map(|p| p.name)
    }

    /// `Err(CommandBlocked)` when `command` matches the deny-list.
    pub fn check(&self, command: &str) -> Result<(), ToolError> {
        match self.first_match(command) {
            Some(pattern) => {
                tracing::warn!(pattern, "Blocked command");
                Err(ToolError::CommandBlocked {
                    pattern: pattern.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(cmd: &str) -> bool {
        CommandPolicy.first_match(cmd).is_some()
    }

    #[test]
    fn all_patterns_compile() {
        assert_eq!(DEFAULT_PATTERNS.len(), PATTERNS.len());
    }

    #[test]
    fn destructive_commands_blocked() {
        for cmd in [
            "rm -rf /",
            "RM -RF /",
            "rm -rf / --no-preserve-root",
            "rm -fr ~",
            "rm -r -f /*",
            "sudo rm --recursive --force $HOME",
            "echo hi && rm -rf /",
            "mkfs.ext4 /dev/sda1",
            "dd if=/dev/zero of=/dev/sda bs=1M",
            ":(){ :|:& };:",
            "shutdown -h now",
            "sudo reboot",
            "poweroff",
            "init 0",
            "chmod -R 777 /",
            "git push --force origin main",
            "git push -f",
            "git push origin +main",
            "git reset --hard HEAD~3",
            "git -C repo reset --hard",
            "git filter-branch --tree-filter 'rm x' HEAD",
            "cat junk > /dev/sda",
        ] {
            assert!(blocked(cmd), "expected {cmd:?} to be blocked");
        }
    }

    #[test]
    fn everyday_commands_allowed() {
        for cmd in [
            "ls -la",
            "rm -rf ./build",
            "rm -rf target/",
            "rm notes.txt",
            "cargo test --workspace",
            "chmod 755 script.sh",
            "chmod -R 777 ./public",
            "dd if=a.img of=b.img",
            "git push origin main",
            "git reset --soft HEAD~1",
            "git status",
            "echo 'halting problem'",
            "python3 -c 'print(1)'",
        ] {
            assert!(!blocked(cmd), "expected {cmd:?} to be allowed");
        }
    }

    #[test]
    fn check_reports_pattern_name() {
        match CommandPolicy.check("rm -rf /") {
            Err(ToolError::CommandBlocked { pattern }) => {
                assert_eq!(pattern, "recursive delete of root or home")
            }
            other => panic!("expected CommandBlocked, got {other:?}"),
        }
    }
}
