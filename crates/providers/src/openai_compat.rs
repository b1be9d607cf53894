//! OpenAI-compatible chat completions adapter.
//!
//! Works with OpenAI and any endpoint that speaks `/chat/completions`
//! (OpenRouter, Ollama, vLLM...). The transcript is flattened into the
//! vendor's message list:
//!
//! - system prompt as the first `system` message
//! - assistant tool uses as `tool_calls` with JSON-string arguments
//! - each tool result as its own `tool` message
//! - thinking blocks dropped

use std::time::Duration;

use alin_core::{
    ContentBlock, ConversationTurn, EventStream, ModelRequest, ModelResponse, ProviderAdapter,
    ProviderError, ProviderKind, Role, StopReason, ToolDefinition, Usage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::accumulator::parse_input;
use crate::bridge;
use crate::http::{build_client, check_status, network_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(120)),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_body(&self, request: &ModelRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": to_api_messages(request.system_prompt.as_deref(), &request.turns),
            "stream": stream,
        });
        if stream {
            body["stream_options"] = json!({"include_usage": true});
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(to_api_tools(&request.tools));
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        check_status("openai", response).await
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, ProviderError> {
        let body = self.build_body(request, true);
        debug!(provider = "openai", model = %request.model, turns = request.turns.len(), "Sending streaming request");
        let response = self.send(&body).await?;
        Ok(bridge::normalize(
            ProviderKind::OpenAi,
            &request.model,
            response.bytes_stream(),
        ))
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_body(request, false);
        debug!(provider = "openai", model = %request.model, turns = request.turns.len(), "Sending completion request");
        let response = self.send(&body).await?;
        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("openai response: {e}")))?;
        api.into_model_response(&request.model)
    }
}

fn to_api_messages(system: Option<&str>, turns: &[ConversationTurn]) -> Vec<ApiMessage> {
    let mut out = Vec::new();
    if let Some(system) = system.filter(|s| !s.is_empty()) {
        out.push(ApiMessage::plain("system", system));
    }

    for turn in turns {
        match turn.role {
            Role::Assistant => {
                let text = turn.text();
                let tool_calls: Vec<ApiToolCall> = turn
                    .tool_uses()
                    .map(|(id, name, input)| ApiToolCall {
                        id: id.to_string(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: name.to_string(),
                            arguments: input.to_string(),
                        },
                    })
                    .collect();
                if text.is_empty() && tool_calls.is_empty() {
                    continue;
                }
                out.push(ApiMessage {
                    role: "assistant".into(),
                    content: (!text.is_empty()).then_some(text),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    tool_call_id: None,
                });
            }
            Role::User => {
                // Tool results first: they must directly follow the
                // assistant message that requested them.
                for block in &turn.content {
                    if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
                        out.push(ApiMessage {
                            role: "tool".into(),
                            content: Some(content.clone()),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                }
                let text = turn.text();
                if !text.is_empty() {
                    out.push(ApiMessage::plain("user", &text));
                }
            }
        }
    }
    out
}

fn to_api_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect()
}

// --- Vendor B wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ApiResponse {
    fn into_model_response(self, requested_model: &str) -> Result<ModelResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".into()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }
        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let saw_tools = !tool_calls.is_empty();
        for call in tool_calls {
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input: parse_input(&call.function.arguments),
            });
        }

        let stop_reason = choice
            .finish_reason
            .as_deref()
            .map(|r| StopReason::from_openai(r, saw_tools))
            .unwrap_or(StopReason::Unknown);
        let usage = self
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            content,
            stop_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user("read both"),
            ConversationTurn::assistant(vec![
                ContentBlock::Thinking { thinking: "plan".into(), signature: Some("s".into()) },
                ContentBlock::text("Reading."),
                ContentBlock::ToolUse { id: "c1".into(), name: "file_read".into(), input: json!({"path": "a"}) },
                ContentBlock::ToolUse { id: "c2".into(), name: "file_read".into(), input: json!({"path": "b"}) },
            ]),
            ConversationTurn::tool_results(vec![
                ContentBlock::tool_result("c1", "A", false),
                ContentBlock::tool_result("c2", "missing", true),
            ]),
        ]
    }

    #[test]
    fn constructor_trims_base_url() {
        let adapter = OpenAiAdapter::new("sk").with_base_url("http://localhost:11434/v1/");
        assert_eq!(adapter.base_url, "http://localhost:11434/v1");
        assert_eq!(adapter.kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn transcript_flattens_into_messages() {
        let messages = to_api_messages(Some("sys"), &transcript());
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "tool"]);

        let assistant = &messages[2];
        assert_eq!(assistant.content.as_deref(), Some("Reading."));
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.arguments, r#"{"path":"a"}"#);

        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[4].content.as_deref(), Some("missing"));
    }

    #[test]
    fn stream_body_requests_usage() {
        let adapter = OpenAiAdapter::new("sk");
        let mut req = ModelRequest::new("gpt-4o", transcript());
        req.max_tokens = Some(256);
        req.tools = vec![ToolDefinition {
            name: "file_read".into(),
            description: "Read a file".into(),
            input_schema: json!({"type": "object"}),
        }];
        let body = adapter.build_body(&req, true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert!(body.get("temperature").is_none());

        let body = adapter.build_body(&req, false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn parses_tool_call_response() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "file_list", "arguments": "{\"path\":\".\"}"}
                    }, {
                        "id": "call_2",
                        "type": "function",
                        "function": {"name": "file_list", "arguments": "not json"}
                    }]
                },
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        });
        let api: ApiResponse = serde_json::from_value(raw).unwrap();
        let resp = api.into_model_response("gpt-4o").unwrap();
        assert_eq!(resp.model, "gpt-4o-2024-08-06");
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.usage, Usage { input_tokens: 20, output_tokens: 5 });
        let turn = ConversationTurn::assistant(resp.content);
        let inputs: Vec<_> = turn.tool_uses().map(|(_, _, input)| input.clone()).collect();
        assert_eq!(inputs, vec![json!({"path": "."}), json!({})]);
    }

    #[test]
    fn empty_choices_are_malformed() {
        let api: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            api.into_model_response("m"),
            Err(ProviderError::MalformedResponse(_))
        ));
    }
}
