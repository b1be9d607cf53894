//! ProviderAdapter trait: the abstraction over model vendors.
//!
//! An adapter knows how to turn a [`ModelRequest`] into one vendor's wire
//! format and how to normalize the answer, either as a stream of
//! [`CanonicalEvent`]s or as a complete [`ModelResponse`]. The agent loop
//! depends only on this trait.

use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::event::{CanonicalEvent, StopReason};
use crate::message::{ContentBlock, ConversationTurn};

/// Which wire grammar a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Vendor A: typed `content_block_*` / `message_*` events.
    Anthropic,
    /// Vendor B: OpenAI-style `choices[].delta` chunks.
    #[serde(alias = "openai_compat")]
    OpenAi,
}

impl ProviderKind {
    /// Infer the provider from a model name when the caller gave no hint.
    pub fn infer_from_model(model: &str) -> Self {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("claude") || lower.starts_with("anthropic/") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "openai_compat" | "openai-compat" => Ok(Self::OpenAi),
            other => Err(ProviderError::NotConfigured(format!("unknown provider '{other}'"))),
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// One round's request to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o")
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// The accumulated transcript
    pub turns: Vec<ConversationTurn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, turns: Vec<ConversationTurn>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            turns,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Token usage for one model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A complete (non-streaming) model answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Which model actually responded (may differ from requested)
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub usage: Usage,
}

/// A lazy, finite, non-restartable sequence of canonical events.
pub type EventStream = Pin<Box<dyn Stream<Item = CanonicalEvent> + Send>>;

/// The core provider seam.
///
/// `stream` fails only before streaming begins (connection errors, non-2xx
/// statuses). Anything that goes wrong afterwards arrives in-band as an
/// `Error` event followed by `Done`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, ProviderError>;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}
