//! Run a short script with a language interpreter.
//!
//! The source is written to a uniquely named file inside the workspace,
//! executed, and removed afterwards whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::CommandPolicy;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::args::required_str;
use crate::process::{ProcessRunner, ProcessSpec};

/// Supported languages: (name, file extension, interpreter, leading args).
const LANGUAGES: &[(&str, &str, &str, &[&str])] = &[
    ("python", "py", "python3", &[]),
    ("javascript", "js", "node", &[]),
    ("typescript", "ts", "npx", &["--yes", "tsx"]),
    ("bash", "sh", "bash", &[]),
];

pub struct ExecuteCodeTool {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ExecuteCodeTool {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            runner,
            timeout,
            max_output_bytes,
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute a python, javascript, typescript or bash snippet in the workspace and return \
         its output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "language": {"type": "string", "enum": ["python", "javascript", "typescript", "bash"]},
                "code": {"type": "string", "description": "Source to run"}
            },
            "required": ["language", "code"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let language = required_str(&input, "language")?.to_ascii_lowercase();
        let code = required_str(&input, "code")?;
        let (_, ext, interpreter, lead) = LANGUAGES
            .iter()
            .find(|(name, ..)| *name == language)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "unsupported language '{language}'; use python, javascript, typescript or bash"
                ))
            })?;
        CommandPolicy.check(code)?;

        let file_name = format!(".alin_exec_{}.{ext}", uuid::Uuid::new_v4().simple());
        let script = ctx.workspace().join(&file_name);
        tokio::fs::write(&script, code.as_bytes()).await?;
        debug!(language, file = %file_name, "Executing snippet");

        let mut args: Vec<String> = lead.iter().map(|s| s.to_string()).collect();
        args.push(file_name);
        let spec = ProcessSpec {
            program: interpreter.to_string(),
            args,
            cwd: ctx.workspace().to_path_buf(),
            timeout: self.timeout,
            max_output_bytes: self.max_output_bytes,
            env: Vec::new(),
        };
        let result = self.runner.run(spec, &ctx.cancel).await;

        if let Err(e) = tokio::fs::remove_file(&script).await {
            warn!(error = %e, path = %script.display(), "Failed to remove script file");
        }

        let output = result?;
        let rendered = output.render(self.max_output_bytes);
        if output.success() {
            Ok(rendered)
        } else {
            Err(ToolError::ExecutionFailed(rendered))
        }
    }
}
