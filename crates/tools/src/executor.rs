//! Executes one model-requested tool call against one workspace.

use std::time::Instant;

use alin_core::{ToolCall, ToolCallRecord, ToolContext, ToolDefinition, ToolError, ToolRegistry};
use chrono::Utc;
use tracing::{debug, warn};

/// Result of a single tool call. Failures are content too: the model reads
/// the error message as an error tool result.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub success: bool,
    pub content: String,
    pub record: ToolCallRecord,
}

#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Restrict the executor to the named tools.
    pub fn restricted(&self, names: &[&str]) -> Self {
        Self::new(self.registry.subset(names))
    }

    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolExecution {
        let started_at = Utc::now();
        let started = Instant::now();

        let result = match self.registry.get(&call.name) {
            None => Err(ToolError::UnknownTool(call.name.clone())),
            Some(_) if ctx.cancel.is_cancelled() => Err(ToolError::Cancelled),
            Some(tool) => {
                debug!(tool = %call.name, id = %call.id, "Executing tool");
                tokio::select! {
                    _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
                    result = tool.execute(call.input.clone(), ctx) => result,
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let (success, content, error_kind) = match result {
            Ok(content) => (true, content, None),
            Err(e) => {
                warn!(tool = %call.name, kind = e.kind(), error = %e, "Tool call failed");
                (false, e.to_string(), Some(e.kind().to_string()))
            }
        };

        ToolExecution {
            success,
            content,
            record: ToolCallRecord {
                tool_name: call.name.clone(),
                input: call.input.clone(),
                started_at,
                duration_ms,
                success,
                error_kind,
            },
        }
    }
}
