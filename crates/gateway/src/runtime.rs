//! Services shared by every request: providers, tools, workspaces, telemetry.

use std::sync::Arc;
use std::time::Duration;

use alin_agent::{AgentLoop, ScanSubLoop, register_explore_tool};
use alin_config::AppConfig;
use alin_core::{ProviderAdapter, ProviderKind, ToolRegistry};
use alin_providers::router::{ProviderRouter, build_from_config};
use alin_telemetry::ReliabilityTracker;
use alin_tools::{
    InMemoryMemoryStore, InMemoryWorkspaceRegistry, LocalProcessRunner, ProcessRunner, ToolExecutor, ToolSettings,
    Workspaces, default_registry,
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Runtime {
    config: AppConfig,
    providers: ProviderRouter,
    tools: ToolRegistry,
    workspaces: Arc<Workspaces>,
    tracker: Arc<ReliabilityTracker>,
    started_at: DateTime<Utc>,
}

impl Runtime {
    pub fn from_config(config: AppConfig) -> Self {
        let providers = build_from_config(&config);
        Self::with_providers(config, providers, Arc::new(LocalProcessRunner))
    }

    /// Assemble a runtime around explicit providers and a process runner.
    pub fn with_providers(config: AppConfig, providers: ProviderRouter, runner: Arc<dyn ProcessRunner>) -> Self {
        let tracker = Arc::new(ReliabilityTracker::new());
        let settings = ToolSettings::from_config(&config);
        let mut tools = default_registry(&settings, runner, Arc::new(InMemoryMemoryStore::new()));

        let scan_kind = ProviderKind::infer_from_model(&config.scan.model);
        match providers.resolve(Some(scan_kind), &config.scan.model) {
            Ok(provider) => {
                let scan = ScanSubLoop::new(provider, &ToolExecutor::new(tools.clone()), &config.scan)
                    .with_sink(tracker.clone());
                register_explore_tool(&mut tools, Arc::new(scan));
            }
            Err(e) => warn!(model = %config.scan.model, error = %e, "explore_codebase disabled"),
        }

        let workspaces = Arc::new(Workspaces::new(
            config.sandbox.workspace_root.clone(),
            Duration::from_secs(config.sandbox.workspace_ttl_secs),
            Arc::new(InMemoryWorkspaceRegistry::new()),
        ));

        info!(
            tools = tools.len(),
            providers = ?providers.kinds(),
            workspace_root = %config.sandbox.workspace_root.display(),
            "Runtime ready"
        );

        Self {
            config,
            providers,
            tools,
            workspaces,
            tracker,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderRouter {
        &self.providers
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn workspaces(&self) -> &Arc<Workspaces> {
        &self.workspaces
    }

    pub fn tracker(&self) -> &Arc<ReliabilityTracker> {
        &self.tracker
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// A loop over `provider`, optionally limited to the named tools.
    pub fn agent(&self, provider: Arc<dyn ProviderAdapter>, only: Option<&[String]>) -> AgentLoop {
        let mut executor = ToolExecutor::new(self.tools.clone());
        if let Some(names) = only {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            executor = executor.restricted(&names);
        }
        AgentLoop::new(provider, executor)
            .with_config(&self.config.agent)
            .with_sink(self.tracker.clone())
            .with_max_tokens(self.config.default_max_tokens)
            .with_temperature(self.config.default_temperature)
    }

    /// Configured system prompt, unless blank.
    pub fn system_prompt(&self) -> Option<String> {
        Some(self.config.system_prompt.clone()).filter(|p| !p.trim().is_empty())
    }

    pub fn spawn_reaper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let every = Duration::from_secs(self.config.sandbox.reap_interval_secs.max(1));
        self.workspaces.clone().spawn_reaper(every, shutdown)
    }
}
