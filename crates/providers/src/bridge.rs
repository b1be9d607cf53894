//! Protocol bridge: vendor SSE grammars in, canonical events out.
//!
//! [`normalize`] wraps an upstream byte stream and yields a lazy, finite
//! sequence of [`CanonicalEvent`]s that always ends with exactly one `Done`.
//! Dropping the returned stream drops the upstream body.
//!
//! Vendor A (`ProviderKind::Anthropic`) sends typed events:
//! `message_start`, `content_block_start/delta/stop`, `message_delta`,
//! `message_stop`, `ping`, `error`. Vendor B (`ProviderKind::OpenAi`) sends
//! `choices[].delta` chunks with indexed `tool_calls`, a `finish_reason`, an
//! optional trailing usage chunk and `[DONE]`.

use std::collections::VecDeque;
use std::fmt::Display;

use alin_core::{CanonicalEvent, EventStream, ProtocolError, ProviderKind, StopReason};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, trace};

use crate::accumulator::ToolCallAccumulator;
use crate::sse::{SseLine, SseLineBuffer};

/// Turns parsed SSE payloads into canonical events for one vendor grammar.
pub trait StreamDecoder: Send {
    /// Handle one `data:` payload.
    fn decode(&mut self, data: &str) -> Result<Vec<CanonicalEvent>, ProtocolError>;

    /// The upstream closed. Emit whatever terminal events are still owed.
    fn finish(&mut self) -> Vec<CanonicalEvent>;
}

/// Decoder for a provider kind.
pub fn decoder_for(kind: ProviderKind, model: &str) -> Box<dyn StreamDecoder> {
    match kind {
        ProviderKind::Anthropic => Box::new(AnthropicDecoder::new(model)),
        ProviderKind::OpenAi => Box::new(OpenAiDecoder::new(model)),
    }
}

/// Wrap an upstream byte stream into a canonical event stream.
///
/// A transport error mid-stream becomes `Error` then `Done`. An upstream that
/// closes without a terminal event yields a synthetic `Done{unknown}`.
pub fn normalize<S, B, E>(kind: ProviderKind, model: &str, upstream: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = BridgeState {
        upstream: Box::pin(upstream),
        lines: SseLineBuffer::new(),
        decoder: decoder_for(kind, model),
        pending: VecDeque::new(),
        closed: false,
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                if event.is_done() {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((event, st));
            }
            if st.finished || st.closed {
                return None;
            }
            match st.upstream.next().await {
                Some(Ok(chunk)) => {
                    for line in st.lines.push(chunk.as_ref()) {
                        st.feed(line);
                    }
                }
                Some(Err(e)) => {
                    debug!(error = %e, "Upstream read failed mid-stream");
                    st.closed = true;
                    st.pending.push_back(CanonicalEvent::Error {
                        message: format!("Stream interrupted: {e}"),
                        status: None,
                    });
                    st.pending.push_back(CanonicalEvent::done(StopReason::Unknown));
                }
                None => {
                    st.closed = true;
                    if let Some(line) = st.lines.finish() {
                        st.feed(line);
                    }
                    if !st.saw_done() {
                        let tail = st.decoder.finish();
                        st.pending.extend(tail);
                    }
                }
            }
        }
    }))
}

struct BridgeState<S> {
    upstream: std::pin::Pin<Box<S>>,
    lines: SseLineBuffer,
    decoder: Box<dyn StreamDecoder>,
    pending: VecDeque<CanonicalEvent>,
    closed: bool,
    finished: bool,
}

impl<S> BridgeState<S> {
    fn saw_done(&self) -> bool {
        self.pending.iter().any(CanonicalEvent::is_done)
    }

    fn feed(&mut self, line: SseLine) {
        // Nothing after Done.
        if self.saw_done() {
            return;
        }
        match line {
            SseLine::Event(name) => trace!(event = %name, "SSE event"),
            SseLine::Data(data) => match self.decoder.decode(&data) {
                Ok(events) => self.pending.extend(events),
                Err(e) => trace!(error = %e, data = %data, "Dropping malformed stream event"),
            },
        }
    }
}

fn parse_json(data: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(data).map_err(|e| ProtocolError::InvalidJson {
        reason: e.to_string(),
    })
}

fn as_u32(v: &Value) -> Option<u32> {
    v.as_u64().map(|n| n.min(u32::MAX as u64) as u32)
}

// --- Vendor A ---

/// Typed-event grammar (`content_block_*`, `message_*`).
pub struct AnthropicDecoder {
    model: String,
    tools: ToolCallAccumulator,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<StopReason>,
    started: bool,
}

impl AnthropicDecoder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            tools: ToolCallAccumulator::new(),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: None,
            started: false,
        }
    }

    fn start(&mut self, model: Option<&str>) -> Option<CanonicalEvent> {
        if self.started {
            return None;
        }
        self.started = true;
        Some(CanonicalEvent::Start {
            model: model.unwrap_or(&self.model).to_string(),
            provider: ProviderKind::Anthropic,
        })
    }

    fn terminal(&mut self) -> Vec<CanonicalEvent> {
        self.tools.discard_all();
        vec![
            CanonicalEvent::Usage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
            },
            CanonicalEvent::done(self.stop_reason.unwrap_or(StopReason::Unknown)),
        ]
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<CanonicalEvent>, ProtocolError> {
        let event = parse_json(data)?;
        let event_type = event["type"].as_str().ok_or(ProtocolError::MissingField("type"))?;
        let index = event["index"].as_u64().unwrap_or(0);
        let mut out = Vec::new();

        match event_type {
            "message_start" => {
                let message = &event["message"];
                if let Some(n) = as_u32(&message["usage"]["input_tokens"]) {
                    self.input_tokens = n;
                }
                if let Some(n) = as_u32(&message["usage"]["output_tokens"]) {
                    self.output_tokens = n;
                }
                out.extend(self.start(message["model"].as_str()));
            }
            "content_block_start" => {
                out.extend(self.start(None));
                let block = &event["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => {
                        out.extend(self.tools.begin(index, block["id"].as_str(), block["name"].as_str()));
                    }
                    Some("text") => {
                        if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                            out.push(CanonicalEvent::TextDelta { text: text.to_string() });
                        }
                    }
                    Some("thinking") => {
                        if let Some(text) = block["thinking"].as_str().filter(|t| !t.is_empty()) {
                            out.push(CanonicalEvent::ThinkingDelta { text: text.to_string() });
                        }
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str() {
                            out.push(CanonicalEvent::TextDelta { text: text.to_string() });
                        }
                    }
                    Some("thinking_delta") => {
                        if let Some(text) = delta["thinking"].as_str() {
                            out.push(CanonicalEvent::ThinkingDelta { text: text.to_string() });
                        }
                    }
                    Some("signature_delta") => {
                        if let Some(sig) = delta["signature"].as_str() {
                            out.push(CanonicalEvent::SignatureDelta { signature: sig.to_string() });
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(partial) = delta["partial_json"].as_str() {
                            out.extend(self.tools.append(index, partial));
                        }
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                out.extend(self.tools.complete(index));
            }
            "message_delta" => {
                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(StopReason::from_anthropic(reason));
                }
                let usage = &event["usage"];
                if let Some(n) = as_u32(&usage["output_tokens"]) {
                    self.output_tokens = n;
                }
                if let Some(n) = as_u32(&usage["input_tokens"]).filter(|n| *n > 0) {
                    self.input_tokens = n;
                }
            }
            "message_stop" => {
                out.extend(self.terminal());
            }
            "error" => {
                let err = &event["error"];
                let message = err["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                let status = match err["type"].as_str() {
                    Some("overloaded_error") => Some(529),
                    Some("rate_limit_error") => Some(429),
                    Some("api_error") => Some(500),
                    _ => None,
                };
                self.tools.discard_all();
                out.push(CanonicalEvent::Error { message, status });
                out.push(CanonicalEvent::done(StopReason::Unknown));
            }
            "ping" => {}
            other => trace!(event_type = other, "Ignoring unknown vendor A event"),
        }
        Ok(out)
    }

    fn finish(&mut self) -> Vec<CanonicalEvent> {
        // Closed before message_stop: whatever was accumulating is not trusted.
        self.tools.discard_all();
        vec![CanonicalEvent::done(StopReason::Unknown)]
    }
}

// --- Vendor B ---

/// OpenAI-style chunk grammar (`choices[].delta`, `[DONE]`).
pub struct OpenAiDecoder {
    model: String,
    tools: ToolCallAccumulator,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: Option<StopReason>,
    started: bool,
}

impl OpenAiDecoder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            tools: ToolCallAccumulator::new(),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: None,
            started: false,
        }
    }

    fn terminal(&mut self) -> Vec<CanonicalEvent> {
        vec![
            CanonicalEvent::Usage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
            },
            CanonicalEvent::done(self.stop_reason.unwrap_or(StopReason::Unknown)),
        ]
    }
}

impl StreamDecoder for OpenAiDecoder {
    fn decode(&mut self, data: &str) -> Result<Vec<CanonicalEvent>, ProtocolError> {
        if data.trim() == "[DONE]" {
            if self.stop_reason.is_none() {
                self.tools.discard_all();
            }
            return Ok(self.terminal());
        }

        let chunk = parse_json(data)?;
        let mut out = Vec::new();

        if !self.started {
            self.started = true;
            out.push(CanonicalEvent::Start {
                model: chunk["model"].as_str().unwrap_or(&self.model).to_string(),
                provider: ProviderKind::OpenAi,
            });
        }

        if let Some(err) = chunk.get("error").filter(|e| !e.is_null()) {
            let message = err["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            let status = err["code"].as_u64().and_then(|c| u16::try_from(c).ok());
            self.tools.discard_all();
            out.push(CanonicalEvent::Error { message, status });
            out.push(CanonicalEvent::done(StopReason::Unknown));
            return Ok(out);
        }

        if let Some(choice) = chunk["choices"].get(0) {
            let delta = &choice["delta"];
            let reasoning = delta["reasoning_content"]
                .as_str()
                .or_else(|| delta["reasoning"].as_str());
            if let Some(text) = reasoning.filter(|t| !t.is_empty()) {
                out.push(CanonicalEvent::ThinkingDelta { text: text.to_string() });
            }
            if let Some(text) = delta["content"].as_str().filter(|t| !t.is_empty()) {
                out.push(CanonicalEvent::TextDelta { text: text.to_string() });
            }
            if let Some(calls) = delta["tool_calls"].as_array() {
                for (pos, call) in calls.iter().enumerate() {
                    let key = call["index"].as_u64().unwrap_or(pos as u64);
                    let function = &call["function"];
                    out.extend(self.tools.begin(key, call["id"].as_str(), function["name"].as_str()));
                    if let Some(args) = function["arguments"].as_str() {
                        out.extend(self.tools.append(key, args));
                    }
                }
            }
            if let Some(reason) = choice["finish_reason"].as_str() {
                out.extend(self.tools.complete_all());
                self.stop_reason = Some(StopReason::from_openai(reason, self.tools.completed() > 0));
            }
        }

        if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
            if let Some(n) = as_u32(&usage["prompt_tokens"]) {
                self.input_tokens = n;
            }
            if let Some(n) = as_u32(&usage["completion_tokens"]) {
                self.output_tokens = n;
            }
        }

        Ok(out)
    }

    fn finish(&mut self) -> Vec<CanonicalEvent> {
        if self.stop_reason.is_some() {
            // finish_reason arrived; only `[DONE]` went missing.
            return self.terminal();
        }
        self.tools.discard_all();
        vec![CanonicalEvent::done(StopReason::Unknown)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ANTHROPIC_STREAM: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4-20250514\",\"usage\":{\"input_tokens\":42,\"output_tokens\":1}}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"Let me look…\"}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"signature_delta\",\"signature\":\"sig==\"}}\n\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "data: {\"type\":\"content_block_start\",\"index\":1,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"text_delta\",\"text\":\"Héllo 🦀 \"}}\n\n",
        "data: {\"type\":\"content_block_stop\",\"index\":1}\n\n",
        "data: {\"type\":\"content_block_start\",\"index\":2,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"file_list\",\"input\":{}}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":2,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"path\\\":\"}}\n\n",
        "data: {\"type\":\"content_block_delta\",\"index\":2,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\" \\\".\\\"}\"}}\n\n",
        "data: {\"type\":\"content_block_stop\",\"index\":2}\n\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":17}}\n\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    const OPENAI_STREAM: &str = concat!(
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Ça va 🦀\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"type\":\"function\",\"function\":{\"name\":\"file_read\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\":\\\"a.txt\\\"}\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_b\",\"function\":{\"arguments\":\"{\\\"pa\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":1,\"function\":{\"name\":\"file_list\",\"arguments\":\"th\\\":\\\".\\\"}\"}}]}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[],\"usage\":{\"prompt_tokens\":30,\"completion_tokens\":12}}\n\n",
        "data: [DONE]\n\n",
    );

    async fn run(kind: ProviderKind, chunks: Vec<Vec<u8>>) -> Vec<CanonicalEvent> {
        let upstream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        normalize(kind, "requested-model", upstream).collect().await
    }

    async fn run_whole(kind: ProviderKind, body: &str) -> Vec<CanonicalEvent> {
        run(kind, vec![body.as_bytes().to_vec()]).await
    }

    fn tool_completes(events: &[CanonicalEvent]) -> Vec<(String, String, Value)> {
        events
            .iter()
            .filter_map(|e| match e {
                CanonicalEvent::ToolUseComplete { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn anthropic_stream_normalizes() {
        let events = run_whole(ProviderKind::Anthropic, ANTHROPIC_STREAM).await;
        assert_eq!(
            events.first(),
            Some(&CanonicalEvent::Start {
                model: "claude-sonnet-4-20250514".into(),
                provider: ProviderKind::Anthropic
            })
        );
        assert!(events.contains(&CanonicalEvent::ThinkingDelta { text: "Let me look…".into() }));
        assert!(events.contains(&CanonicalEvent::SignatureDelta { signature: "sig==".into() }));
        assert!(events.contains(&CanonicalEvent::TextDelta { text: "Héllo 🦀 ".into() }));
        assert_eq!(
            tool_completes(&events),
            vec![("toolu_1".into(), "file_list".into(), json!({"path": "."}))]
        );
        let n = events.len();
        assert_eq!(
            events[n - 2],
            CanonicalEvent::Usage { input_tokens: 42, output_tokens: 17 }
        );
        assert_eq!(events[n - 1], CanonicalEvent::done(StopReason::ToolUse));
    }

    #[tokio::test]
    async fn openai_stream_normalizes() {
        let events = run_whole(ProviderKind::OpenAi, OPENAI_STREAM).await;
        assert_eq!(
            events.first(),
            Some(&CanonicalEvent::Start { model: "gpt-4o".into(), provider: ProviderKind::OpenAi })
        );
        assert!(events.contains(&CanonicalEvent::TextDelta { text: "Ça va 🦀".into() }));
        assert_eq!(
            tool_completes(&events),
            vec![
                ("call_a".into(), "file_read".into(), json!({"path": "a.txt"})),
                ("call_b".into(), "file_list".into(), json!({"path": "."})),
            ]
        );
        // Name arrived after the first fragment: start is deferred, the
        // buffered fragment is flushed right after it.
        let start_b = events
            .iter()
            .position(|e| matches!(e, CanonicalEvent::ToolUseStart { id, .. } if id == "call_b"))
            .unwrap();
        assert_eq!(
            events[start_b + 1],
            CanonicalEvent::ToolUseInputFragment { id: "call_b".into(), fragment: "{\"pa".into() }
        );
        let n = events.len();
        assert_eq!(events[n - 2], CanonicalEvent::Usage { input_tokens: 30, output_tokens: 12 });
        assert_eq!(events[n - 1], CanonicalEvent::done(StopReason::ToolUse));
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_matter() {
        for (kind, body) in [
            (ProviderKind::Anthropic, ANTHROPIC_STREAM),
            (ProviderKind::OpenAi, OPENAI_STREAM),
        ] {
            let bytes = body.as_bytes();
            let expected = run_whole(kind, body).await;
            for split in 1..bytes.len() {
                let chunks = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
                assert_eq!(run(kind, chunks).await, expected, "{kind} split at {split}");
            }
            // one byte at a time
            let chunks = bytes.iter().map(|b| vec![*b]).collect();
            assert_eq!(run(kind, chunks).await, expected, "{kind} byte by byte");
        }
    }

    #[tokio::test]
    async fn malformed_events_are_dropped() {
        let body = concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"model\":\"m\",\"usage\":{\"input_tokens\":1}}}\n",
            "data: {not json\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"ok\"}}\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n",
            "data: {\"type\":\"message_stop\"}\n",
        );
        let events = run_whole(ProviderKind::Anthropic, body).await;
        assert!(events.contains(&CanonicalEvent::TextDelta { text: "ok".into() }));
        assert_eq!(events.last(), Some(&CanonicalEvent::done(StopReason::EndTurn)));
    }

    #[tokio::test]
    async fn early_close_emits_synthetic_done_and_discards_pending_tools() {
        let body = concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"model\":\"m\",\"usage\":{\"input_tokens\":1}}}\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"t\",\"name\":\"file_read\"}}\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"pa\"}}\n",
        );
        let events = run_whole(ProviderKind::Anthropic, body).await;
        assert!(tool_completes(&events).is_empty());
        assert_eq!(events.last(), Some(&CanonicalEvent::done(StopReason::Unknown)));
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);

        let events = run_whole(ProviderKind::OpenAi, "").await;
        assert_eq!(events, vec![CanonicalEvent::done(StopReason::Unknown)]);
    }

    #[tokio::test]
    async fn openai_missing_done_after_finish_reason_keeps_stop_reason() {
        let body = concat!(
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hi\"}}]}\n",
            "data: {\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"length\"}]}\n",
        );
        let events = run_whole(ProviderKind::OpenAi, body).await;
        assert_eq!(events.last(), Some(&CanonicalEvent::done(StopReason::MaxTokens)));
    }

    #[tokio::test]
    async fn openai_stop_with_tool_calls_means_tool_use() {
        let body = concat!(
            "data: {\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c\",\"function\":{\"name\":\"file_list\",\"arguments\":\"{}\"}}]}}]}\n",
            "data: {\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: [DONE]\n",
        );
        let events = run_whole(ProviderKind::OpenAi, body).await;
        assert_eq!(events.last(), Some(&CanonicalEvent::done(StopReason::ToolUse)));
    }

    #[tokio::test]
    async fn vendor_error_event_ends_stream() {
        let body = concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"model\":\"m\",\"usage\":{\"input_tokens\":1}}}\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n",
        );
        let events = run_whole(ProviderKind::Anthropic, body).await;
        let n = events.len();
        assert_eq!(
            events[n - 2],
            CanonicalEvent::Error { message: "Overloaded".into(), status: Some(529) }
        );
        assert_eq!(events[n - 1], CanonicalEvent::done(StopReason::Unknown));
        assert!(!events.contains(&CanonicalEvent::TextDelta { text: "late".into() }));
    }

    #[tokio::test]
    async fn transport_error_becomes_error_then_done() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"par\"}}]}\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok(b"data: {\"model\":\"m\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"never\"}}]}\n".to_vec()),
        ];
        let events: Vec<_> = normalize(ProviderKind::OpenAi, "m", futures::stream::iter(chunks))
            .collect()
            .await;
        let n = events.len();
        assert!(matches!(&events[n - 2], CanonicalEvent::Error { message, .. } if message.contains("reset by peer")));
        assert_eq!(events[n - 1], CanonicalEvent::done(StopReason::Unknown));
        assert!(!events.contains(&CanonicalEvent::TextDelta { text: "never".into() }));
    }
}
