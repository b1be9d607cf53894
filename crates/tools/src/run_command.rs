//! Shell tool: run a command with `sh -c` inside the workspace.
//!
//! The command text goes through the deny-list first; a blocked command
//! never reaches the process runner.

use std::sync::Arc;
use std::time::Duration;

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::CommandPolicy;
use async_trait::async_trait;
use tracing::debug;

use crate::args::{optional_usize, required_str};
use crate::process::{ProcessRunner, ProcessSpec};

pub struct RunCommandTool {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl RunCommandTool {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            runner,
            timeout,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return exit code, stdout and stderr. \
         Destructive commands are refused."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command line"},
                "timeout_secs": {"type": "integer", "description": "Lower the default timeout for this command"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let command = required_str(&input, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("command is empty".into()));
        }
        CommandPolicy.check(command)?;

        let timeout = optional_usize(&input, "timeout_secs")
            .map(|s| Duration::from_secs(s as u64).min(self.timeout))
            .filter(|d| !d.is_zero())
            .unwrap_or(self.timeout);

        debug!(command, "Running command");
        let spec = ProcessSpec::shell(command, ctx.workspace(), timeout, self.max_output_bytes);
        let output = self.runner.run(spec, &ctx.cancel).await?;
        let rendered = output.render(self.max_output_bytes);
        if output.success() {
            Ok(rendered)
        } else {
            Err(ToolError::ExecutionFailed(rendered))
        }
    }
}
