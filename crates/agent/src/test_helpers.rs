//! Scripted provider for loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alin_core::{
    CanonicalEvent, ContentBlock, EventStream, ModelRequest, ModelResponse, ProviderAdapter, ProviderError,
    ProviderKind, StopReason, Usage,
};

use crate::round::RoundAssembler;

#[derive(Debug, Clone)]
pub enum Step {
    Respond(ModelResponse),
    Fail(ProviderError),
    /// Raw events, used as-is when streaming.
    Stream(Vec<CanonicalEvent>),
}

/// Plays back one step per call, to `stream` and `complete` alike.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<Step>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            delay: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with the same step.
    pub fn repeating(step: Step) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat = Some(step);
        provider
    }

    /// Each call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion rather than being dropped.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn request(&self, index: usize) -> ModelRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    async fn next_step(&self, request: &ModelRequest) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| panic!("ScriptedProvider: no step for call #{}", self.calls()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        step
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn stream(&self, request: &ModelRequest) -> Result<EventStream, ProviderError> {
        let events = match self.next_step(request).await {
            Step::Respond(response) => response_events(&response),
            Step::Fail(err) => return Err(err),
            Step::Stream(events) => events,
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        match self.next_step(request).await {
            Step::Respond(response) => Ok(response),
            Step::Fail(err) => Err(err),
            Step::Stream(events) => {
                let mut assembler = RoundAssembler::new();
                for event in &events {
                    assembler.push(event);
                }
                let round = assembler.finish()?;
                Ok(ModelResponse {
                    model: request.model.clone(),
                    content: round.content,
                    stop_reason: round.stop_reason,
                    usage: round.usage,
                })
            }
        }
    }
}

/// The canonical events a bridge would produce for `response`.
pub fn response_events(response: &ModelResponse) -> Vec<CanonicalEvent> {
    let mut events = vec![CanonicalEvent::Start {
        model: response.model.clone(),
        provider: ProviderKind::Anthropic,
    }];
    for block in &response.content {
        match block {
            ContentBlock::Text { text } => events.push(CanonicalEvent::TextDelta { text: text.clone() }),
            ContentBlock::Thinking { thinking, signature } => {
                events.push(CanonicalEvent::ThinkingDelta {
                    text: thinking.clone(),
                });
                if let Some(signature) = signature {
                    events.push(CanonicalEvent::SignatureDelta {
                        signature: signature.clone(),
                    });
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                events.push(CanonicalEvent::ToolUseStart {
                    id: id.clone(),
                    name: name.clone(),
                });
                events.push(CanonicalEvent::ToolUseComplete {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }
    events.push(CanonicalEvent::Usage {
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
    });
    events.push(CanonicalEvent::done(response.stop_reason));
    events
}

pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        model: "mock".into(),
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// A short preamble followed by one tool call.
pub fn tool_response(id: &str, name: &str, input: serde_json::Value) -> ModelResponse {
    ModelResponse {
        model: "mock".into(),
        content: vec![
            ContentBlock::text("Checking."),
            ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            },
        ],
        stop_reason: StopReason::ToolUse,
        usage: Usage {
            input_tokens: 20,
            output_tokens: 8,
        },
    }
}
