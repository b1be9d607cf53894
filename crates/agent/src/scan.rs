//! Read-only exploration loop, exposed to the main loop as `explore_codebase`.
//!
//! The scan loop runs a cheaper model over the read-only tool subset with a
//! hard iteration ceiling and no time budget of its own. Running out of
//! iterations is not a failure here: the caller gets whatever the model had
//! concluded so far.

use std::sync::Arc;

use alin_config::ScanConfig;
use alin_core::{BudgetKind, ConversationTurn, LoopError, ProviderAdapter, Tool, ToolContext, ToolError};
use alin_security::{relative_display, resolve_in_workspace};
use alin_telemetry::ReliabilitySink;
use alin_tools::{READ_ONLY_TOOLS, ToolExecutor};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::budget::LoopBudget;
use crate::loop_runner::{AgentLoop, LoopRequest};

const SCAN_SYSTEM_PROMPT: &str = "You are exploring a codebase on behalf of another assistant. \
Use the read-only tools to answer the task, then reply with a concise summary of what you found: \
relevant files, how they fit together, and anything surprising. Do not speculate about files you \
have not read.";

const NO_SUMMARY_NOTICE: &str = "Exploration stopped at its iteration limit before producing a summary.";

/// What an exploration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub summary: String,
    /// False when the iteration ceiling cut the exploration short.
    pub complete: bool,
    pub iterations: u32,
}

pub struct ScanSubLoop {
    agent: AgentLoop,
    model: String,
}

impl ScanSubLoop {
    /// `executor` is narrowed to the read-only tools.
    pub fn new(provider: Arc<dyn ProviderAdapter>, executor: &ToolExecutor, config: &ScanConfig) -> Self {
        let agent = AgentLoop::new(provider, executor.restricted(READ_ONLY_TOOLS))
            .with_budget(LoopBudget::new(config.max_iterations, None))
            .with_max_tokens(config.max_tokens);
        Self {
            agent,
            model: config.model.clone(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReliabilitySink>) -> Self {
        self.agent = self.agent.with_sink(sink);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn explore(&self, task: &str, ctx: &ToolContext) -> Result<ScanOutcome, LoopError> {
        let request = LoopRequest::new(self.model.clone(), vec![ConversationTurn::user(task)])
            .with_system_prompt(SCAN_SYSTEM_PROMPT);
        let run = self.agent.run(request, ctx, None).await;

        match run.outcome {
            Ok(()) => Ok(ScanOutcome {
                summary: run.final_text().unwrap_or_default(),
                complete: true,
                iterations: run.iterations,
            }),
            Err(LoopError::BudgetExceeded {
                kind: BudgetKind::Iterations,
            }) => {
                info!(iterations = run.iterations, "Scan hit its iteration ceiling, returning partial summary");
                Ok(ScanOutcome {
                    summary: run.final_text().unwrap_or_else(|| NO_SUMMARY_NOTICE.to_string()),
                    complete: false,
                    iterations: run.iterations,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Spawns a scan sub-loop over the caller's workspace.
pub struct ExploreCodebaseTool {
    scan: Arc<ScanSubLoop>,
}

impl ExploreCodebaseTool {
    pub fn new(scan: Arc<ScanSubLoop>) -> Self {
        Self { scan }
    }
}

#[async_trait]
impl Tool for ExploreCodebaseTool {
    fn name(&self) -> &str {
        "explore_codebase"
    }

    fn description(&self) -> &str {
        "Delegate a read-only investigation of the workspace to a helper that can list, read and \
         search files. Returns its summary. Use for broad questions like 'how is auth wired up?'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "What to find out"},
                "path": {"type": "string", "description": "Directory to focus on (default: workspace root)"}
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let task = input["task"]
            .as_str()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("missing 'task' argument".into()))?;

        let task = match input["path"].as_str().filter(|p| !p.is_empty() && *p != ".") {
            Some(path) => {
                let resolved = resolve_in_workspace(ctx.workspace(), path)?;
                if !resolved.exists() {
                    return Err(ToolError::NotFound(format!("path not found: {path}")));
                }
                let shown = relative_display(ctx.workspace(), &resolved);
                format!("{task}\n\nFocus on `{shown}`.")
            }
            None => task.to_string(),
        };

        debug!(model = %self.scan.model(), "Starting codebase exploration");
        let outcome = self
            .scan
            .explore(&task, ctx)
            .await
            .map_err(|e| match e {
                LoopError::Cancelled => ToolError::Cancelled,
                other => ToolError::ExecutionFailed(format!("exploration failed: {other}")),
            })?;

        if outcome.complete {
            Ok(outcome.summary)
        } else {
            Ok(format!(
                "[partial: exploration stopped after {} iterations]\n{}",
                outcome.iterations, outcome.summary
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alin_core::{ProviderError, ToolRegistry};
    use alin_tools::file_list::FileListTool;
    use alin_tools::file_write::FileWriteTool;
    use serde_json::json;

    use crate::test_helpers::{ScriptedProvider, Step, text_response, tool_response};

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FileListTool));
        registry.register(Arc::new(FileWriteTool));
        ToolExecutor::new(registry)
    }

    fn config(max_iterations: u32) -> ScanConfig {
        ScanConfig {
            max_iterations,
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn scan_returns_final_summary() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_response("t1", "file_list", json!({}))),
            Step::Respond(text_response("The repo is empty.")),
        ]));
        let scan = ScanSubLoop::new(provider.clone(), &executor(), &config(8));
        let outcome = scan.explore("what is here?", &ToolContext::new(dir.path())).await.unwrap();

        assert!(outcome.complete);
        assert_eq!(outcome.summary, "The repo is empty.");
        assert_eq!(outcome.iterations, 1);

        let request = provider.request(0);
        assert_eq!(request.model, "claude-3-5-haiku-20241022");
        assert_eq!(request.max_tokens, Some(4096));
        let tools: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tools, vec!["file_list"]);
    }

    #[tokio::test]
    async fn ceiling_returns_partial_summary() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::repeating(Step::Respond(tool_response(
            "t",
            "file_list",
            json!({}),
        ))));
        let scan = ScanSubLoop::new(provider.clone(), &executor(), &config(2));
        let outcome = scan.explore("dig", &ToolContext::new(dir.path())).await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert!(!outcome.complete);
        assert_eq!(outcome.summary, "Checking.");
    }

    #[tokio::test]
    async fn explore_tool_marks_partial_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let provider = Arc::new(ScriptedProvider::repeating(Step::Respond(tool_response(
            "t",
            "file_list",
            json!({}),
        ))));
        let scan = Arc::new(ScanSubLoop::new(provider.clone(), &executor(), &config(1)));
        let tool = ExploreCodebaseTool::new(scan);

        let out = tool
            .execute(json!({"task": "map it", "path": "src"}), &ToolContext::new(dir.path()))
            .await
            .unwrap();
        assert!(out.starts_with("[partial: exploration stopped after 1 iterations]"));
        assert!(provider.request(0).turns[0].text().contains("Focus on `src`"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn explore_tool_rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("elsewhere")).unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let tool = ExploreCodebaseTool::new(Arc::new(ScanSubLoop::new(provider.clone(), &executor(), &config(8))));

        let err = tool
            .execute(json!({"task": "x", "path": "elsewhere"}), &ToolContext::new(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathTraversal { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(ProviderError::Http {
            status: 400,
            message: "bad".into(),
            retry_after: None,
        })]));
        let tool = ExploreCodebaseTool::new(Arc::new(ScanSubLoop::new(provider, &executor(), &config(8))));
        let err = tool
            .execute(json!({"task": "x"}), &ToolContext::new(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution_failed");
    }
}
