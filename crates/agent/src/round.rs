//! Folds one round's canonical events into assistant content blocks.

use alin_core::{CanonicalEvent, ContentBlock, ModelResponse, ProviderError, StopReason, ToolCall, Usage};

/// What a model round produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl Round {
    pub fn from_response(response: ModelResponse) -> Self {
        Self {
            content: response.content,
            stop_reason: response.stop_reason,
            usage: response.usage,
        }
    }

    /// Completed tool calls, in arrival order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RoundAssembler {
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
    usage: Usage,
    error: Option<(String, Option<u16>)>,
}

impl RoundAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &CanonicalEvent) {
        match event {
            CanonicalEvent::Start { .. } => {}
            CanonicalEvent::TextDelta { text } => match self.content.last_mut() {
                Some(ContentBlock::Text { text: current }) => current.push_str(text),
                _ => self.content.push(ContentBlock::text(text.clone())),
            },
            CanonicalEvent::ThinkingDelta { text } => match self.content.last_mut() {
                Some(ContentBlock::Thinking { thinking, signature: None }) => thinking.push_str(text),
                _ => self.content.push(ContentBlock::Thinking {
                    thinking: text.clone(),
                    signature: None,
                }),
            },
            CanonicalEvent::SignatureDelta { signature } => {
                let last_thinking = self
                    .content
                    .iter_mut()
                    .rev()
                    .find(|b| matches!(b, ContentBlock::Thinking { .. }));
                if let Some(ContentBlock::Thinking { signature: sig, .. }) = last_thinking {
                    sig.get_or_insert_with(String::new).push_str(signature);
                }
            }
            // Fragments are assembled by the bridge; only completions matter here.
            CanonicalEvent::ToolUseStart { .. } | CanonicalEvent::ToolUseInputFragment { .. } => {}
            CanonicalEvent::ToolUseComplete { id, name, input } => self.content.push(ContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            CanonicalEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                // Vendors report cumulative counts; keep the largest seen.
                self.usage.input_tokens = self.usage.input_tokens.max(*input_tokens);
                self.usage.output_tokens = self.usage.output_tokens.max(*output_tokens);
            }
            CanonicalEvent::Done { stop_reason } => self.stop_reason = Some(*stop_reason),
            CanonicalEvent::Error { message, status } => {
                if self.error.is_none() {
                    self.error = Some((message.clone(), *status));
                }
            }
        }
    }

    /// Whether anything the client could have seen has been assembled.
    pub fn has_output(&self) -> bool {
        !self.content.is_empty()
    }

    /// Non-empty text assembled so far, for a round that will not finish.
    pub fn partial_text(&self) -> Vec<ContentBlock> {
        self.content
            .iter()
            .filter(|b| matches!(b, ContentBlock::Text { text } if !text.is_empty()))
            .cloned()
            .collect()
    }

    /// Finish the round. An in-band error becomes a `ProviderError`.
    pub fn finish(self) -> Result<Round, ProviderError> {
        if let Some((message, status)) = self.error {
            return Err(match status {
                Some(status) => ProviderError::Http {
                    status,
                    message,
                    retry_after: None,
                },
                None => ProviderError::StreamInterrupted(message),
            });
        }
        let content = self
            .content
            .into_iter()
            .filter(|b| !matches!(b, ContentBlock::Text { text } if text.is_empty()))
            .collect();
        Ok(Round {
            content,
            stop_reason: self.stop_reason.unwrap_or(StopReason::Unknown),
            usage: self.usage,
        })
    }
}
