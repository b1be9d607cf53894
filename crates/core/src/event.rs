//! Canonical events: the provider-agnostic output of the protocol bridge.
//!
//! Whatever wire grammar a vendor speaks, the rest of the system only ever
//! sees this sequence. For a given tool call id, fragments arrive in order
//! and `ToolUseComplete` is emitted exactly once per round.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Unknown,
}

impl StopReason {
    /// Map a vendor A `stop_reason` string.
    pub fn from_anthropic(reason: &str) -> Self {
        match reason {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            _ => Self::Unknown,
        }
    }

    /// Map a vendor B `finish_reason`. A plain `stop` in a round that
    /// completed tool calls still means the model wants tool results.
    pub fn from_openai(reason: &str, saw_tool_calls: bool) -> Self {
        match reason {
            "stop" if saw_tool_calls => Self::ToolUse,
            "stop" => Self::EndTurn,
            "tool_calls" | "function_call" => Self::ToolUse,
            "length" => Self::MaxTokens,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The protocol bridge's output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    Start {
        model: String,
        provider: ProviderKind,
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
    ToolUseStart {
        id: String,
        name: String,
    },
    ToolUseInputFragment {
        id: String,
        fragment: String,
    },
    ToolUseComplete {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done {
        stop_reason: StopReason,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl CanonicalEvent {
    pub fn done(stop_reason: StopReason) -> Self {
        Self::Done { stop_reason }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}
