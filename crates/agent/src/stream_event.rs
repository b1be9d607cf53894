//! Client-facing loop events.
//!
//! The gateway forwards these as server-sent events named by
//! [`LoopEvent::event_type`], with the JSON body as data. A loop emits
//! exactly one `done`; an aborted loop emits `error` first.

use alin_core::{StopReason, Usage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    Start {
        model: String,
        provider: String,
    },

    TextDelta {
        text: String,
    },

    ThinkingDelta {
        text: String,
    },

    SignatureDelta {
        signature: String,
    },

    /// The model asked for a tool; arguments are complete.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolResult {
        tool_use_id: String,
        name: String,
        content: String,
        is_error: bool,
    },

    Done {
        iterations: u32,
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },

    Error {
        kind: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl LoopEvent {
    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TextDelta { .. } => "text_delta",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::SignatureDelta { .. } => "signature_delta",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}
