//! Model provider adapters for Alin.
//!
//! Both adapters implement `alin_core::ProviderAdapter`. Streaming responses
//! pass through [`bridge::normalize`], which turns either vendor's SSE
//! grammar into `CanonicalEvent`s. The router picks an adapter per request.

pub mod accumulator;
pub mod anthropic;
pub mod bridge;
pub mod http;
pub mod openai_compat;
pub mod router;
pub mod sse;

pub use anthropic::AnthropicAdapter;
pub use bridge::normalize;
pub use openai_compat::OpenAiAdapter;
pub use router::{ProviderRouter, build_from_config};
