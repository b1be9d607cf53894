//! Provider router: one adapter per vendor grammar.
//!
//! Resolution order for a request: explicit provider, then the configured
//! default, then inference from the model name.

use std::collections::HashMap;
use std::sync::Arc;

use alin_config::AppConfig;
use alin_core::{ProviderAdapter, ProviderError, ProviderKind};
use tracing::{debug, warn};

use crate::anthropic::AnthropicAdapter;
use crate::openai_compat::OpenAiAdapter;

#[derive(Clone, Default)]
pub struct ProviderRouter {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    default_kind: Option<ProviderKind>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with_default(mut self, kind: ProviderKind) -> Self {
        self.default_kind = Some(kind);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Pick the adapter for `(explicit, model)`.
    pub fn resolve(
        &self,
        explicit: Option<ProviderKind>,
        model: &str,
    ) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        let kind = explicit
            .or(self.default_kind)
            .unwrap_or_else(|| ProviderKind::infer_from_model(model));
        debug!(provider = %kind, model, "Resolved provider");
        self.get(kind).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no {kind} provider registered (set {})",
                env_hint(kind)
            ))
        })
    }

    /// Registered kinds, sorted by name.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("adapters", &self.kinds())
            .field("default_kind", &self.default_kind)
            .finish()
    }
}

fn env_hint(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::OpenAi => "OPENAI_API_KEY or providers.openai.api_url",
    }
}

/// Build adapters for every configured provider.
///
/// The OpenAI-compatible adapter is also registered keyless when an
/// `api_url` is set, for local servers that need no key.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();

    let anthropic = &config.providers.anthropic;
    if let Some(key) = anthropic.api_key.as_deref().filter(|k| !k.is_empty()) {
        let mut adapter = AnthropicAdapter::new(key);
        if let Some(url) = &anthropic.api_url {
            adapter = adapter.with_base_url(url);
        }
        if let Some(budget) = anthropic.thinking_budget {
            adapter = adapter.with_thinking_budget(budget);
        }
        router.register(Arc::new(adapter));
    }

    let openai = &config.providers.openai;
    let openai_key = openai.api_key.as_deref().filter(|k| !k.is_empty());
    if openai_key.is_some() || openai.api_url.is_some() {
        let mut adapter = OpenAiAdapter::new(openai_key.unwrap_or_default());
        if let Some(url) = &openai.api_url {
            adapter = adapter.with_base_url(url);
        }
        router.register(Arc::new(adapter));
    }

    if let Some(name) = &config.default_provider {
        match name.parse::<ProviderKind>() {
            Ok(kind) => router = router.with_default(kind),
            Err(e) => warn!(error = %e, "Ignoring default_provider"),
        }
    }

    if router.is_empty() {
        warn!("No provider configured; chat requests will fail until an API key is set");
    }
    router
}
