//! Anthropic Messages API adapter.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Content blocks sent 1:1, thinking replayed with its signature
//! - Streaming normalized through [`crate::bridge`]
//! - Optional extended thinking budget

use std::time::Duration;

use alin_core::{
    ContentBlock, ConversationTurn, EventStream, ModelRequest, ModelResponse, ProviderAdapter,
    ProviderError, ProviderKind, Role, StopReason, ToolDefinition, Usage,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::bridge;
use crate::http::{build_client, check_status, network_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    thinking_budget: Option<u32>,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            // Slow with thinking enabled.
            client: build_client(Duration::from_secs(300)),
            thinking_budget: None,
        }
    }

    /// Custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_thinking_budget(mut self, budget_tokens: u32) -> Self {
        self.thinking_budget = Some(budget_tokens);
        self
    }

    fn build_body(&self, request: &ModelRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": to_api_messages(&request.turns),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if stream {
            body["stream"] = json!(true);
        }
        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(to_api_tools(&request.tools));
        }
        match self.thinking_budget {
            Some(budget) => {
                // Temperature must stay at its default with thinking on.
                body["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
            }
            None => {
                if let Some(t) = request.temperature {
                    body["temperature"] = json!(t);
                }
            }
        }
        body
    }

    async fn send(&self, body: &Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let mut req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);
        if stream {
            req = req.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        let response = req.send().await.map_err(network_error)?;
        check_status("anthropic", response).await
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, ProviderError> {
        let body = self.build_body(request, true);
        debug!(provider = "anthropic", model = %request.model, turns = request.turns.len(), "Sending streaming request");
        let response = self.send(&body, true).await?;
        Ok(bridge::normalize(
            ProviderKind::Anthropic,
            &request.model,
            response.bytes_stream(),
        ))
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_body(request, false);
        debug!(provider = "anthropic", model = %request.model, turns = request.turns.len(), "Sending completion request");
        let response = self.send(&body, false).await?;
        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("anthropic response: {e}")))?;
        Ok(api.into_model_response())
    }
}

/// Transcript to vendor A `messages`. Empty text and unsigned thinking blocks
/// are rejected by the API, so they are left out.
fn to_api_messages(turns: &[ConversationTurn]) -> Vec<Value> {
    turns
        .iter()
        .filter_map(|turn| {
            let blocks: Vec<&ContentBlock> = turn
                .content
                .iter()
                .filter(|b| match b {
                    ContentBlock::Text { text } => !text.is_empty(),
                    ContentBlock::Thinking { signature, .. } => signature.is_some(),
                    _ => true,
                })
                .collect();
            if blocks.is_empty() {
                return None;
            }
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            Some(json!({"role": role, "content": blocks}))
        })
        .collect()
}

fn to_api_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

// --- Vendor A response types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl ApiResponse {
    fn into_model_response(self) -> ModelResponse {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(ContentBlock::Text { text }),
                ResponseBlock::Thinking { thinking, signature } => {
                    Some(ContentBlock::Thinking { thinking, signature })
                }
                ResponseBlock::ToolUse { id, name, input } => {
                    let input = if input.is_object() { input } else { json!({}) };
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ResponseBlock::Other => None,
            })
            .collect();

        ModelResponse {
            model: self.model,
            content,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(StopReason::from_anthropic)
                .unwrap_or(StopReason::Unknown),
            usage: Usage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ModelRequest {
        let mut req = ModelRequest::new(
            "claude-sonnet-4-20250514",
            vec![
                ConversationTurn::user("list files"),
                ConversationTurn::assistant(vec![
                    ContentBlock::Thinking { thinking: "hmm".into(), signature: Some("sig".into()) },
                    ContentBlock::Thinking { thinking: "unsigned".into(), signature: None },
                    ContentBlock::text(""),
                    ContentBlock::ToolUse {
                        id: "toolu_1".into(),
                        name: "file_list".into(),
                        input: json!({"path": "."}),
                    },
                ]),
                ConversationTurn::tool_results(vec![ContentBlock::tool_result("toolu_1", "a.txt", false)]),
            ],
        );
        req.system_prompt = Some("be brief".into());
        req.temperature = Some(0.2);
        req.tools = vec![ToolDefinition {
            name: "file_list".into(),
            description: "List a directory".into(),
            input_schema: json!({"type": "object"}),
        }];
        req
    }

    #[test]
    fn constructor_with_base_url() {
        let adapter = AnthropicAdapter::new("sk-ant-test").with_base_url("http://localhost:9999/");
        assert_eq!(adapter.base_url, "http://localhost:9999");
        assert_eq!(adapter.kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn body_maps_blocks_one_to_one() {
        let adapter = AnthropicAdapter::new("k");
        let body = adapter.build_body(&request(), true);

        assert_eq!(body["system"], "be brief");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");

        let assistant = &body["messages"][1]["content"];
        assert_eq!(assistant.as_array().unwrap().len(), 2);
        assert_eq!(assistant[0]["type"], "thinking");
        assert_eq!(assistant[0]["signature"], "sig");
        assert_eq!(assistant[1]["type"], "tool_use");
        assert_eq!(assistant[1]["input"]["path"], ".");

        let results = &body["messages"][2];
        assert_eq!(results["role"], "user");
        assert_eq!(results["content"][0]["type"], "tool_result");
        assert_eq!(results["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn thinking_budget_replaces_temperature() {
        let adapter = AnthropicAdapter::new("k").with_thinking_budget(2048);
        let body = adapter.build_body(&request(), false);
        assert_eq!(body["thinking"]["budget_tokens"], 2048);
        assert!(body.get("temperature").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn parses_complete_response() {
        let raw = json!({
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "thinking", "thinking": "let me see", "signature": "s"},
                {"type": "text", "text": "Listing."},
                {"type": "tool_use", "id": "toolu_1", "name": "file_list", "input": {"path": "."}},
                {"type": "redacted_thinking", "data": "xx"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });
        let resp: ApiResponse = serde_json::from_value(raw).unwrap();
        let resp = resp.into_model_response();
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.content.len(), 3);
        assert_eq!(resp.usage, Usage { input_tokens: 12, output_tokens: 7 });
        let turn = ConversationTurn::assistant(resp.content);
        assert_eq!(turn.tool_uses().count(), 1);
        assert_eq!(turn.text(), "Listing.");
    }
}
