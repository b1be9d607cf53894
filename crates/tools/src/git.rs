//! Git with a verb allow-list. Arguments are passed straight to `git`,
//! never through a shell, and repository discovery stops at the workspace
//! root so a workspace that is not a repository never falls through to an
//! enclosing one.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::check_git_args;
use async_trait::async_trait;
use tracing::debug;

use crate::args::string_list;
use crate::process::{ProcessRunner, ProcessSpec};

pub struct GitTool {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl GitTool {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            runner,
            timeout,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> &str {
        "Run a git command in the workspace. The first argument must be the verb \
         (status, diff, log, show, add, commit, ...)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Arguments after 'git', e.g. [\"log\", \"--oneline\", \"-5\"]"
                }
            },
            "required": ["args"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args = string_list(&input, "args")?;
        let verb = check_git_args(&args, ctx.workspace())?;
        debug!(verb = verb.name, writes = verb.writes, "Running git");

        let spec = ProcessSpec {
            program: "git".into(),
            args,
            cwd: ctx.workspace().to_path_buf(),
            timeout: self.timeout,
            max_output_bytes: self.max_output_bytes,
            env: discovery_ceiling(ctx.workspace()).into_iter().collect(),
        };
        let output = self.runner.run(spec, &ctx.cancel).await?;
        let rendered = output.render(self.max_output_bytes);
        if output.success() {
            Ok(rendered)
        } else {
            Err(ToolError::ExecutionFailed(rendered))
        }
    }
}

/// `GIT_CEILING_DIRECTORIES` set to the workspace's parent.
fn discovery_ceiling(workspace: &Path) -> Option<(String, String)> {
    let root = workspace.canonicalize().unwrap_or_else(|_| workspace.to_path_buf());
    let parent = root.parent()?;
    Some(("GIT_CEILING_DIRECTORIES".into(), parent.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tests::SpyRunner;
    use serde_json::json;

    fn tool(spy: &Arc<SpyRunner>) -> GitTool {
        GitTool::new(spy.clone(), Duration::from_secs(5), 1000)
    }

    #[tokio::test]
    async fn allowed_verbs_run_without_shell() {
        let spy = Arc::new(SpyRunner::default());
        let ctx = ToolContext::new(std::env::temp_dir());
        tool(&spy).execute(json!({"args": ["log", "--oneline", "-3"]}), &ctx).await.unwrap();
        let spec = spy.last.lock().unwrap().clone().unwrap();
        assert_eq!(spec.program, "git");
        assert_eq!(spec.args, vec!["log", "--oneline", "-3"]);
        let parent = std::env::temp_dir().canonicalize().unwrap().parent().unwrap().display().to_string();
        assert_eq!(spec.env, vec![("GIT_CEILING_DIRECTORIES".to_string(), parent)]);
    }

    #[tokio::test]
    async fn writes_outside_the_workspace_never_spawn() {
        let spy = Arc::new(SpyRunner::default());
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        for args in [
            json!(["diff", "--no-index", "--output=/tmp/escape.txt", "a", "b"]),
            json!(["clone", "https://example.com/r.git", "/tmp/elsewhere"]),
            json!(["status", "--work-tree=/"]),
        ] {
            let err = tool(&spy).execute(json!({"args": args}), &ctx).await.unwrap_err();
            assert!(
                matches!(err.kind(), "git_operation_blocked" | "path_traversal"),
                "{args}: {err}"
            );
        }
        assert_eq!(spy.count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn enclosing_repository_is_not_discovered() {
        let outer = tempfile::tempdir().unwrap();
        let init = std::process::Command::new("git").arg("init").arg("-q").current_dir(outer.path()).status();
        if !init.is_ok_and(|s| s.success()) {
            return; // git is not installed
        }
        let workspace = outer.path().join("ws");
        std::fs::create_dir(&workspace).unwrap();
        let ctx = ToolContext::new(&workspace);
        let git = GitTool::new(Arc::new(crate::process::LocalProcessRunner), Duration::from_secs(10), 10_000);
        let err = git.execute(json!({"args": ["status"]}), &ctx).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("not a git repository"), "{err}");
    }

    #[tokio::test]
    async fn disallowed_verbs_and_options_blocked() {
        let spy = Arc::new(SpyRunner::default());
        let ctx = ToolContext::new(std::env::temp_dir());
        for args in [json!(["gc"]), json!(["-C", "/", "status"]), json!(["config", "core.editor", "vim"])] {
            let err = tool(&spy).execute(json!({"args": args}), &ctx).await.unwrap_err();
            assert_eq!(err.kind(), "git_operation_blocked");
        }
        let err = tool(&spy)
            .execute(json!({"args": ["push", "--force", "origin", "main"]}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "command_blocked");
        assert_eq!(spy.count(), 0);
    }
}
