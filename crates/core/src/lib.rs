//! # Alin Core
//!
//! Domain types, traits, and error definitions for the Alin agent runtime.
//! Nothing here talks to the network or the filesystem: the crate defines the
//! vocabulary (turns, canonical events, tool calls, workspaces) and the seams
//! (`ProviderAdapter`, `Tool`, `WorkspaceRegistry`, `MemoryStore`) that the
//! other crates implement against.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use error::{
    BudgetKind, Error, LoopError, MemoryError, ProtocolError, ProviderError, Result, ToolError,
    WorkspaceError,
};
pub use event::{CanonicalEvent, StopReason};
pub use memory::{MemoryEntry, MemoryStore};
pub use message::{ContentBlock, ConversationTurn, Role};
pub use provider::{
    EventStream, ModelRequest, ModelResponse, ProviderAdapter, ProviderKind, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCall, ToolCallRecord, ToolContext, ToolRegistry};
pub use workspace::{WorkspaceEntry, WorkspaceRegistry};
