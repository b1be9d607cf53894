//! The agent loop: model round, tool round, repeat, under budgets.
//!
//! ```text
//! Calling ──(no tool calls)──▶ Done
//!    │  ▲
//!    │  └──────── AwaitingToolResults (tools in arrival order)
//!    └─(budget, provider error, cancel)──▶ Aborted
//! ```

use std::sync::Arc;

use alin_config::AgentConfig;
use alin_core::{
    BudgetKind, CanonicalEvent, ContentBlock, ConversationTurn, LoopError, ModelRequest, ProviderAdapter,
    ProviderError, Role, StopReason, ToolCall, ToolContext, ToolDefinition, ToolError, Usage,
};
use alin_telemetry::{ModelCallRecord, NullSink, ReliabilitySink};
use alin_tools::ToolExecutor;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::budget::{BudgetClock, LoopBudget};
use crate::compress::compress_tool_result;
use crate::retry::{RetryPolicy, sleep_cancellable};
use crate::round::{Round, RoundAssembler};
use crate::stream_event::LoopEvent;

/// One user turn's worth of work.
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub transcript: Vec<ConversationTurn>,
    /// Stream model output through the bridge instead of `complete()`.
    pub stream: bool,
}

impl LoopRequest {
    pub fn new(model: impl Into<String>, transcript: Vec<ConversationTurn>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            transcript,
            stream: false,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[derive(Debug, Clone)]
pub enum LoopState {
    Calling,
    AwaitingToolResults(Vec<ToolCall>),
    Done,
    Aborted(LoopError),
}

/// The transcript produced so far, whatever the outcome.
#[derive(Debug, Clone)]
pub struct LoopRun {
    pub transcript: Vec<ConversationTurn>,
    pub iterations: u32,
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
    pub outcome: Result<(), LoopError>,
}

impl LoopRun {
    pub fn is_complete(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Text of the last assistant turn that has any.
    pub fn final_text(&self) -> Option<String> {
        self.transcript
            .iter()
            .rev()
            .filter(|t| t.role == Role::Assistant)
            .map(ConversationTurn::text)
            .find(|t| !t.trim().is_empty())
    }
}

/// Sends loop events to the client; a closed channel counts as a disconnect.
struct Emitter {
    tx: Option<mpsc::Sender<LoopEvent>>,
    cancel: CancellationToken,
}

impl Emitter {
    async fn emit(&self, event: LoopEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() && !self.cancel.is_cancelled() {
            debug!("Event channel closed, cancelling loop");
            self.cancel.cancel();
        }
    }
}

enum Attempt {
    Ok(Round),
    Failed {
        error: ProviderError,
        retry_safe: bool,
        /// Text already forwarded before the failure.
        partial: Vec<ContentBlock>,
    },
    Cancelled,
    TimedOut,
}

/// A round that ended the loop, with any text the client already saw.
struct RoundFailure {
    error: LoopError,
    partial: Vec<ContentBlock>,
}

impl From<LoopError> for RoundFailure {
    fn from(error: LoopError) -> Self {
        Self {
            error,
            partial: Vec::new(),
        }
    }
}

pub struct AgentLoop {
    provider: Arc<dyn ProviderAdapter>,
    executor: ToolExecutor,
    sink: Arc<dyn ReliabilitySink>,
    budget: LoopBudget,
    retry: RetryPolicy,
    tool_result_max_chars: usize,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn ProviderAdapter>, executor: ToolExecutor) -> Self {
        let config = AgentConfig::default();
        Self {
            provider,
            executor,
            sink: Arc::new(NullSink),
            budget: LoopBudget::from_config(&config),
            retry: RetryPolicy::from_config(&config),
            tool_result_max_chars: config.tool_result_max_chars,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Budgets, retry policy and compression from `[agent]`.
    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.budget = LoopBudget::from_config(config);
        self.retry = RetryPolicy::from_config(config);
        self.tool_result_max_chars = config.tool_result_max_chars;
        self
    }

    pub fn with_budget(mut self, budget: LoopBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReliabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_tool_result_max_chars(mut self, max: usize) -> Self {
        self.tool_result_max_chars = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Run one loop to completion.
    ///
    /// `ctx.cancel` aborts the loop and any in-flight process. Events, when a
    /// channel is given, end with exactly one `done`.
    pub async fn run(&self, request: LoopRequest, ctx: &ToolContext, events: Option<mpsc::Sender<LoopEvent>>) -> LoopRun {
        let cancel = ctx.cancel.child_token();
        let tool_ctx = ctx.clone().with_cancel(cancel.clone());
        let emitter = Emitter {
            tx: events,
            cancel: cancel.clone(),
        };
        let tools = self.executor.definitions();

        info!(
            model = %request.model,
            provider = %self.provider.kind(),
            turns = request.transcript.len(),
            tools = tools.len(),
            "Starting agent loop"
        );
        emitter
            .emit(LoopEvent::Start {
                model: request.model.clone(),
                provider: self.provider.kind().to_string(),
            })
            .await;

        let mut clock = self.budget.start();
        let mut transcript = request.transcript.clone();
        let mut usage = Usage::default();
        let mut stop_reason = None;
        let mut state = LoopState::Calling;

        let outcome = loop {
            state = match state {
                LoopState::Calling => {
                    if cancel.is_cancelled() {
                        LoopState::Aborted(LoopError::Cancelled)
                    } else if let Err(e) = clock.check() {
                        LoopState::Aborted(e)
                    } else {
                        let model_request = self.model_request(&request, &transcript, &tools);
                        match self
                            .call_model(&model_request, request.stream, &clock, &emitter, &cancel)
                            .await
                        {
                            Err(failure) => {
                                if !failure.partial.is_empty() {
                                    transcript.push(ConversationTurn::assistant(failure.partial));
                                }
                                LoopState::Aborted(failure.error)
                            }
                            Ok(round) => {
                                usage.add(round.usage);
                                stop_reason = Some(round.stop_reason);
                                let calls = round.tool_calls();
                                if !round.content.is_empty() {
                                    transcript.push(ConversationTurn::assistant(round.content));
                                }
                                // Every tool_use gets a result, whatever the stop reason.
                                if calls.is_empty() {
                                    LoopState::Done
                                } else {
                                    LoopState::AwaitingToolResults(calls)
                                }
                            }
                        }
                    }
                }
                LoopState::AwaitingToolResults(calls) => {
                    debug!(count = calls.len(), iteration = clock.iterations_used() + 1, "Executing tool round");
                    let results = self.run_tools(&calls, &tool_ctx, &emitter).await;
                    transcript.push(ConversationTurn::tool_results(results));
                    clock.record_iteration();
                    if cancel.is_cancelled() {
                        LoopState::Aborted(LoopError::Cancelled)
                    } else {
                        LoopState::Calling
                    }
                }
                LoopState::Done => break Ok(()),
                LoopState::Aborted(e) => break Err(e),
            };
        };

        match &outcome {
            Ok(()) => info!(iterations = clock.iterations_used(), "Agent loop finished"),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, iterations = clock.iterations_used(), "Agent loop aborted");
                emitter
                    .emit(LoopEvent::Error {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                        status: e.status(),
                    })
                    .await;
            }
        }
        emitter
            .emit(LoopEvent::Done {
                iterations: clock.iterations_used(),
                usage,
                stop_reason,
            })
            .await;

        LoopRun {
            transcript,
            iterations: clock.iterations_used(),
            usage,
            stop_reason,
            outcome,
        }
    }

    fn model_request(&self, request: &LoopRequest, transcript: &[ConversationTurn], tools: &[ToolDefinition]) -> ModelRequest {
        let mut model_request = ModelRequest::new(request.model.clone(), transcript.to_vec());
        model_request.system_prompt = request.system_prompt.clone();
        model_request.tools = tools.to_vec();
        model_request.max_tokens = self.max_tokens;
        model_request.temperature = self.temperature;
        model_request
    }

    /// One model round with retries, bounded by the wall-clock deadline.
    async fn call_model(
        &self,
        request: &ModelRequest,
        stream: bool,
        clock: &BudgetClock,
        emitter: &Emitter,
        cancel: &CancellationToken,
    ) -> Result<Round, RoundFailure> {
        let mut attempt = 0u32;
        loop {
            let started_at = Utc::now();
            let started = Instant::now();
            let pending = self.attempt(request, stream, emitter, cancel);
            let result = match clock.deadline() {
                Some(deadline) => tokio::time::timeout_at(deadline, pending)
                    .await
                    .unwrap_or(Attempt::TimedOut),
                None => pending.await,
            };

            let mut record = ModelCallRecord {
                model: request.model.clone(),
                provider: self.provider.kind(),
                started_at,
                duration_ms: started.elapsed().as_millis() as u64,
                success: false,
                status: None,
                input_tokens: 0,
                output_tokens: 0,
            };

            match result {
                Attempt::Ok(round) => {
                    record.success = true;
                    record.input_tokens = round.usage.input_tokens;
                    record.output_tokens = round.usage.output_tokens;
                    self.sink.record_model_call(&record);
                    return Ok(round);
                }
                Attempt::Cancelled => return Err(LoopError::Cancelled.into()),
                Attempt::TimedOut => {
                    self.sink.record_model_call(&record);
                    return Err(LoopError::BudgetExceeded { kind: BudgetKind::Time }.into());
                }
                Attempt::Failed {
                    error,
                    retry_safe,
                    partial,
                } => {
                    record.status = error.status();
                    self.sink.record_model_call(&record);
                    if !(retry_safe && self.retry.should_retry(attempt, &error)) {
                        return Err(RoundFailure {
                            error: error.into(),
                            partial,
                        });
                    }
                    let delay = self.retry.delay(attempt, &error);
                    if clock.deadline().is_some_and(|d| Instant::now() + delay >= d) {
                        return Err(LoopError::BudgetExceeded { kind: BudgetKind::Time }.into());
                    }
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient provider failure, retrying"
                    );
                    sleep_cancellable(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &ModelRequest, stream: bool, emitter: &Emitter, cancel: &CancellationToken) -> Attempt {
        if !stream {
            let response = tokio::select! {
                _ = cancel.cancelled() => return Attempt::Cancelled,
                response = self.provider.complete(request) => response,
            };
            return match response {
                Ok(response) => {
                    let round = Round::from_response(response);
                    for event in content_events(&round.content) {
                        emitter.emit(event).await;
                    }
                    Attempt::Ok(round)
                }
                Err(error) => Attempt::Failed {
                    error,
                    retry_safe: true,
                    partial: Vec::new(),
                },
            };
        }

        let opened = tokio::select! {
            _ = cancel.cancelled() => return Attempt::Cancelled,
            opened = self.provider.stream(request) => opened,
        };
        let mut events = match opened {
            Ok(events) => events,
            Err(error) => {
                return Attempt::Failed {
                    error,
                    retry_safe: true,
                    partial: Vec::new(),
                };
            }
        };

        let mut assembler = RoundAssembler::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Attempt::Cancelled,
                next = events.next() => next,
            };
            let Some(event) = next else { break };
            if let Some(forwarded) = forward(&event) {
                emitter.emit(forwarded).await;
            }
            assembler.push(&event);
            if event.is_done() {
                break;
            }
        }

        // Output already streamed to the client cannot be taken back.
        let retry_safe = !assembler.has_output();
        let partial = assembler.partial_text();
        match assembler.finish() {
            Ok(round) => Attempt::Ok(round),
            Err(error) => Attempt::Failed {
                error,
                retry_safe,
                partial,
            },
        }
    }

    /// Execute a round's tool calls sequentially, in arrival order.
    async fn run_tools(&self, calls: &[ToolCall], ctx: &ToolContext, emitter: &Emitter) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let (content, is_error) = if ctx.cancel.is_cancelled() {
                (ToolError::Cancelled.to_string(), true)
            } else {
                let execution = self.executor.execute(call, ctx).await;
                self.sink.record_tool_call(&execution.record);
                (
                    compress_tool_result(&execution.content, self.tool_result_max_chars),
                    !execution.success,
                )
            };
            emitter
                .emit(LoopEvent::ToolResult {
                    tool_use_id: call.id.clone(),
                    name: call.name.clone(),
                    content: content.clone(),
                    is_error,
                })
                .await;
            results.push(ContentBlock::tool_result(call.id.clone(), content, is_error));
        }
        results
    }
}

/// Canonical events the client sees live.
fn forward(event: &CanonicalEvent) -> Option<LoopEvent> {
    match event {
        CanonicalEvent::TextDelta { text } => Some(LoopEvent::TextDelta { text: text.clone() }),
        CanonicalEvent::ThinkingDelta { text } => Some(LoopEvent::ThinkingDelta { text: text.clone() }),
        CanonicalEvent::SignatureDelta { signature } => Some(LoopEvent::SignatureDelta {
            signature: signature.clone(),
        }),
        CanonicalEvent::ToolUseComplete { id, name, input } => Some(LoopEvent::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        }),
        _ => None,
    }
}

/// Events for a round that arrived whole.
fn content_events(content: &[ContentBlock]) -> Vec<LoopEvent> {
    let mut events = Vec::new();
    for block in content {
        match block {
            ContentBlock::Text { text } => events.push(LoopEvent::TextDelta { text: text.clone() }),
            ContentBlock::Thinking { thinking, signature } => {
                events.push(LoopEvent::ThinkingDelta { text: thinking.clone() });
                if let Some(signature) = signature {
                    events.push(LoopEvent::SignatureDelta {
                        signature: signature.clone(),
                    });
                }
            }
            ContentBlock::ToolUse { id, name, input } => events.push(LoopEvent::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            ContentBlock::ToolResult { .. } => {}
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use alin_core::ToolRegistry;
    use alin_telemetry::ReliabilityTracker;
    use alin_tools::file_list::FileListTool;
    use serde_json::json;

    use crate::test_helpers::{ScriptedProvider, Step, text_response, tool_response};

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FileListTool));
        ToolExecutor::new(registry)
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        AgentLoop::new(provider, executor()).with_retry(RetryPolicy::none())
    }

    fn user(text: &str) -> Vec<ConversationTurn> {
        vec![ConversationTurn::user(text)]
    }

    async fn collect(mut rx: mpsc::Receiver<LoopEvent>) -> Vec<LoopEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_response("t1", "file_list", json!({"path": "."}))),
            Step::Respond(text_response("There is one file: notes.md")),
        ]));
        let ctx = ToolContext::new(dir.path());

        let run = agent(provider.clone())
            .run(LoopRequest::new("mock", user("list files in .")), &ctx, None)
            .await;

        assert!(run.is_complete());
        assert_eq!(run.iterations, 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(run.transcript.len(), 4);
        assert_eq!(run.transcript[1].role, Role::Assistant);
        assert!(run.transcript[2].has_tool_results());
        match &run.transcript[2].content[0] {
            ContentBlock::ToolResult { tool_use_id, content, is_error } => {
                assert_eq!(tool_use_id, "t1");
                assert!(content.contains("notes.md"));
                assert!(!is_error);
            }
            other => panic!("unexpected block {other:?}"),
        }
        assert_eq!(run.final_text().as_deref(), Some("There is one file: notes.md"));

        // The model saw the tool result on the second call.
        let second = provider.request(1);
        assert_eq!(second.turns.len(), 3);
        assert_eq!(second.tools.len(), 1);
    }

    #[tokio::test]
    async fn iteration_budget_stops_after_three_calls() {
        let provider = Arc::new(ScriptedProvider::repeating(Step::Respond(tool_response(
            "t",
            "file_list",
            json!({}),
        ))));
        let ctx = ToolContext::new(std::env::temp_dir());
        let run = agent(provider.clone())
            .with_budget(LoopBudget::new(3, None))
            .run(LoopRequest::new("mock", user("loop forever")), &ctx, None)
            .await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(run.iterations, 3);
        assert!(matches!(
            run.outcome,
            Err(LoopError::BudgetExceeded { kind: BudgetKind::Iterations })
        ));
        // user + 3 x (assistant, tool results)
        assert_eq!(run.transcript.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_interrupts_slow_model() {
        let provider = Arc::new(
            ScriptedProvider::repeating(Step::Respond(tool_response("t", "file_list", json!({}))))
                .with_delay(Duration::from_millis(500)),
        );
        let ctx = ToolContext::new(std::env::temp_dir());
        let started = Instant::now();
        let run = agent(provider.clone())
            .with_budget(LoopBudget::new(10, Some(Duration::from_millis(100))))
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;

        assert!(matches!(run.outcome, Err(LoopError::BudgetExceeded { kind: BudgetKind::Time })));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(provider.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_retry_then_succeed() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Fail(ProviderError::Http {
                status: 529,
                message: "overloaded".into(),
                retry_after: None,
            }),
            Step::Fail(ProviderError::Http {
                status: 429,
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(3)),
            }),
            Step::Respond(text_response("ok")),
        ]));
        let tracker = Arc::new(ReliabilityTracker::new());
        let ctx = ToolContext::new(std::env::temp_dir());
        let started = Instant::now();
        let run = AgentLoop::new(provider.clone(), executor())
            .with_retry(RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(10)))
            .with_sink(tracker.clone())
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;

        assert!(run.is_complete());
        assert_eq!(provider.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
        let stats = &tracker.snapshot().models["mock"];
        assert_eq!(stats.calls.calls, 3);
        assert_eq!(stats.calls.failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_give_up_after_ceiling() {
        let provider = Arc::new(ScriptedProvider::repeating(Step::Fail(ProviderError::Http {
            status: 500,
            message: "boom".into(),
            retry_after: None,
        })));
        let ctx = ToolContext::new(std::env::temp_dir());
        let run = AgentLoop::new(provider.clone(), executor())
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(100)))
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;

        assert_eq!(provider.calls(), 3);
        match run.outcome {
            Err(LoopError::Provider { status, retryable, .. }) => {
                assert_eq!(status, Some(500));
                assert!(retryable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail(ProviderError::Http {
            status: 400,
            message: "bad request".into(),
            retry_after: None,
        })]));
        let ctx = ToolContext::new(std::env::temp_dir());
        let run = AgentLoop::new(provider.clone(), executor())
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;
        assert_eq!(provider.calls(), 1);
        assert_eq!(run.outcome.unwrap_err().status(), Some(400));
        assert_eq!(run.transcript.len(), 1);
    }

    #[tokio::test]
    async fn streamed_failure_emits_error_then_done() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Stream(vec![
            CanonicalEvent::TextDelta { text: "Hel".into() },
            CanonicalEvent::Error {
                message: "connection reset".into(),
                status: None,
            },
            CanonicalEvent::done(StopReason::Unknown),
        ])]));
        let ctx = ToolContext::new(std::env::temp_dir());
        let (tx, rx) = mpsc::channel(64);
        let run = agent(provider)
            .run(LoopRequest::new("mock", user("hi")).streaming(true), &ctx, Some(tx))
            .await;
        assert!(!run.is_complete());

        let events = collect(rx).await;
        let names: Vec<_> = events.iter().map(LoopEvent::event_type).collect();
        assert_eq!(names, vec!["start", "text_delta", "error", "done"]);
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);

        // The streamed prefix stays in the transcript.
        assert_eq!(run.transcript.len(), 2);
        assert_eq!(run.transcript[1].role, Role::Assistant);
        assert_eq!(run.transcript[1].content, vec![ContentBlock::text("Hel")]);
    }

    #[tokio::test]
    async fn tool_calls_run_even_with_natural_stop_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut mislabelled = tool_response("t1", "file_list", json!({}));
        mislabelled.stop_reason = StopReason::EndTurn;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(mislabelled),
            Step::Respond(text_response("done")),
        ]));
        let ctx = ToolContext::new(dir.path());
        let run = agent(provider.clone()).run(LoopRequest::new("mock", user("hi")), &ctx, None).await;

        assert!(run.is_complete());
        assert_eq!(provider.calls(), 2);
        assert_eq!(run.iterations, 1);
        assert!(run.transcript[2].has_tool_results());
        assert_eq!(run.final_text().as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn streaming_round_forwards_tool_events() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_response("t1", "file_list", json!({}))),
            Step::Respond(text_response("done")),
        ]));
        let ctx = ToolContext::new(dir.path());
        let (tx, rx) = mpsc::channel(64);
        let run = agent(provider)
            .run(LoopRequest::new("mock", user("hi")).streaming(true), &ctx, Some(tx))
            .await;
        assert!(run.is_complete());

        let names: Vec<_> = collect(rx).await.iter().map(LoopEvent::event_type).collect();
        assert_eq!(
            names,
            vec!["start", "text_delta", "tool_use", "tool_result", "text_delta", "done"]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back_not_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_response("t1", "does_not_exist", json!({}))),
            Step::Respond(text_response("sorry")),
        ]));
        let ctx = ToolContext::new(std::env::temp_dir());
        let run = agent(provider)
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;
        assert!(run.is_complete());
        assert!(matches!(
            &run.transcript[2].content[0],
            ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("Unknown tool")
        ));
    }

    #[tokio::test]
    async fn oversized_tool_results_are_compressed() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..200 {
            std::fs::write(dir.path().join(format!("file_with_a_long_name_{i:04}.txt")), "x").unwrap();
        }
        let provider = Arc::new(ScriptedProvider::new(vec![
            Step::Respond(tool_response("t1", "file_list", json!({}))),
            Step::Respond(text_response("ok")),
        ]));
        let ctx = ToolContext::new(dir.path());
        let run = agent(provider)
            .with_tool_result_max_chars(500)
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;
        match &run.transcript[2].content[0] {
            ContentBlock::ToolResult { content, .. } => {
                assert!(content.contains("characters omitted ...]"));
                assert!(content.chars().count() < 600);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_aborts_without_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Respond(text_response("never"))]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ToolContext::new(std::env::temp_dir()).with_cancel(cancel);
        let run = agent(provider.clone())
            .run(LoopRequest::new("mock", user("hi")), &ctx, None)
            .await;
        assert!(matches!(run.outcome, Err(LoopError::Cancelled)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn closed_event_channel_cancels_loop() {
        let provider = Arc::new(ScriptedProvider::repeating(Step::Respond(tool_response(
            "t",
            "file_list",
            json!({}),
        ))));
        let ctx = ToolContext::new(std::env::temp_dir());
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let run = agent(provider.clone())
            .run(LoopRequest::new("mock", user("hi")), &ctx, Some(tx))
            .await;
        assert!(matches!(run.outcome, Err(LoopError::Cancelled)));
        assert_eq!(provider.calls(), 0);
    }
}
