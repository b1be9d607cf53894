//! The agent loop controller for Alin.
//!
//! One [`AgentLoop`] run handles one user turn: call the model, execute any
//! tools it asks for, feed the results back, and repeat until the model
//! answers without tools or a budget runs out. The [`scan`] module reuses the
//! same loop as a read-only explorer behind the `explore_codebase` tool.

pub mod budget;
pub mod compress;
pub mod loop_runner;
pub mod retry;
pub mod round;
pub mod scan;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use alin_core::ToolRegistry;

pub use budget::{BudgetClock, LoopBudget};
pub use compress::compress_tool_result;
pub use loop_runner::{AgentLoop, LoopRequest, LoopRun, LoopState};
pub use retry::RetryPolicy;
pub use round::{Round, RoundAssembler};
pub use scan::{ExploreCodebaseTool, ScanOutcome, ScanSubLoop};
pub use stream_event::LoopEvent;

/// Add `explore_codebase` to a registry of workspace tools.
pub fn register_explore_tool(registry: &mut ToolRegistry, scan: Arc<ScanSubLoop>) {
    registry.register(Arc::new(ExploreCodebaseTool::new(scan)));
}
