//! Built-in tools for Alin and the executor that runs them.
//!
//! Every filesystem tool resolves paths through
//! `alin_security::resolve_in_workspace`; every process-spawning tool goes
//! through a [`ProcessRunner`] with a timeout, output caps and the request's
//! cancellation token. Tool failures are returned to the model as text, never
//! raised to the loop.

mod args;
mod text;
mod walk;

pub mod code_search;
pub mod edit_file;
pub mod execute_code;
pub mod executor;
pub mod file_list;
pub mod file_read;
pub mod file_write;
pub mod git;
pub mod memory;
pub mod memory_tools;
pub mod process;
pub mod run_command;
pub mod scan_directory;
pub mod settings;
pub mod web_fetch;
pub mod web_search;
pub mod workspace;

use std::sync::Arc;

use alin_core::{MemoryStore, ToolRegistry};

pub use executor::{ToolExecution, ToolExecutor};
pub use memory::InMemoryMemoryStore;
pub use process::{LocalProcessRunner, ProcessOutput, ProcessRunner, ProcessSpec};
pub use settings::ToolSettings;
pub use workspace::{InMemoryWorkspaceRegistry, Workspaces, tool_context, validate_workspace_id};

/// Tools that only read the workspace.
pub const READ_ONLY_TOOLS: &[&str] = &["file_read", "file_list", "scan_directory", "code_search"];

/// Registry with the full built-in catalogue.
pub fn default_registry(
    settings: &ToolSettings,
    runner: Arc<dyn ProcessRunner>,
    memory: Arc<dyn MemoryStore>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(file_read::FileReadTool::new(settings.file_read_max_bytes)));
    registry.register(Arc::new(file_write::FileWriteTool));
    registry.register(Arc::new(file_list::FileListTool));
    registry.register(Arc::new(scan_directory::ScanDirectoryTool::new(
        settings.scan_max_depth,
        settings.scan_file_bytes,
        settings.scan_total_bytes,
    )));
    registry.register(Arc::new(code_search::CodeSearchTool::new(settings.search_max_matches)));
    registry.register(Arc::new(edit_file::EditFileTool));
    registry.register(Arc::new(run_command::RunCommandTool::new(
        runner.clone(),
        settings.command_timeout,
        settings.max_output_bytes,
    )));
    registry.register(Arc::new(execute_code::ExecuteCodeTool::new(
        runner.clone(),
        settings.command_timeout,
        settings.max_output_bytes,
    )));
    registry.register(Arc::new(git::GitTool::new(
        runner,
        settings.command_timeout,
        settings.max_output_bytes,
    )));
    registry.register(Arc::new(web_search::WebSearchTool::new(
        settings.brave_api_key.clone(),
        settings.search_max_results,
    )));
    registry.register(Arc::new(web_fetch::WebFetchTool::new(settings.fetch_max_chars)));
    registry.register(Arc::new(memory_tools::MemoryStoreTool::new(memory.clone())));
    registry.register(Arc::new(memory_tools::MemoryRecallTool::new(memory)));
    registry
}
