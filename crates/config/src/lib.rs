//! Configuration loading, validation, and management for Alin.
//!
//! Loads configuration from `~/.alin/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.alin/config.toml`. Every field has a default, so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default model for the primary loop
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Force a provider ("anthropic" or "openai") instead of inferring it
    /// from the model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_temperature: Option<f32>,

    /// System prompt used when a request supplies none
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_system_prompt() -> String {
    "You are Alin, a capable software assistant. You work inside a sandboxed \
     workspace and can read and edit files, run commands, use git and search \
     the web through the tools provided. Prefer small, verifiable steps."
        .into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,

    #[serde(default)]
    pub openai: ProviderConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the vendor base URL (proxies, compatible servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Extended thinking budget in tokens (vendor A only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("thinking_budget", &self.thinking_budget)
            .finish()
    }
}

/// Budgets and retry policy of the primary loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Wall-clock budget per loop; `None` disables it
    #[serde(
        default = "default_max_wall_clock_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_wall_clock_secs: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Tool results longer than this are truncated head+tail
    #[serde(default = "default_tool_result_max_chars")]
    pub tool_result_max_chars: usize,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_max_wall_clock_secs() -> Option<u64> {
    Some(600)
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_tool_result_max_chars() -> usize {
    20_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_wall_clock_secs: default_max_wall_clock_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            tool_result_max_chars: default_tool_result_max_chars(),
        }
    }
}

/// The read-only exploration sub-loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Smaller, faster model for exploration
    #[serde(default = "default_scan_model")]
    pub model: String,

    #[serde(default = "default_scan_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_scan_max_tokens")]
    pub max_tokens: u32,
}

fn default_scan_model() -> String {
    "claude-3-5-haiku-20241022".into()
}
fn default_scan_max_iterations() -> u32 {
    8
}
fn default_scan_max_tokens() -> u32 {
    4096
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model: default_scan_model(),
            max_iterations: default_scan_max_iterations(),
            max_tokens: default_scan_max_tokens(),
        }
    }
}

/// Resource bounds for tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directory under which per-id workspaces are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Cap for each of stdout and stderr
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    #[serde(default = "default_file_read_max_bytes")]
    pub file_read_max_bytes: usize,

    /// Idle time after which a workspace is reaped
    #[serde(default = "default_workspace_ttl_secs")]
    pub workspace_ttl_secs: u64,

    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    #[serde(default = "default_scan_max_depth")]
    pub scan_max_depth: usize,

    #[serde(default = "default_scan_file_bytes")]
    pub scan_file_bytes: usize,

    #[serde(default = "default_scan_total_bytes")]
    pub scan_total_bytes: usize,

    #[serde(default = "default_search_max_matches")]
    pub search_max_matches: usize,
}

fn default_workspace_root() -> PathBuf {
    AppConfig::config_dir().join("workspaces")
}
fn default_command_timeout_secs() -> u64 {
    60
}
fn default_max_output_bytes() -> usize {
    100_000
}
fn default_file_read_max_bytes() -> usize {
    200_000
}
fn default_workspace_ttl_secs() -> u64 {
    3_600
}
fn default_reap_interval_secs() -> u64 {
    300
}
fn default_scan_max_depth() -> usize {
    4
}
fn default_scan_file_bytes() -> usize {
    8_000
}
fn default_scan_total_bytes() -> usize {
    60_000
}
fn default_search_max_matches() -> usize {
    100
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            command_timeout_secs: default_command_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            file_read_max_bytes: default_file_read_max_bytes(),
            workspace_ttl_secs: default_workspace_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            scan_max_depth: default_scan_max_depth(),
            scan_file_bytes: default_scan_file_bytes(),
            scan_total_bytes: default_scan_total_bytes(),
            search_max_matches: default_search_max_matches(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Brave Search API key; `web_search` fails cleanly without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brave_api_key: Option<String>,

    #[serde(default = "default_search_results")]
    pub max_results: usize,

    /// Cap on text returned by `web_fetch`
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,
}

fn default_search_results() -> usize {
    5
}
fn default_fetch_max_chars() -> usize {
    50_000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            brave_api_key: None,
            max_results: default_search_results(),
            fetch_max_chars: default_fetch_max_chars(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("brave_api_key", &redact(&self.brave_api_key))
            .field("max_results", &self.max_results)
            .field("fetch_max_chars", &self.fetch_max_chars)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.alin/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `BRAVE_API_KEY`
    /// - `ALIN_MODEL`, `ALIN_PROVIDER`
    /// - `ALIN_WORKSPACE_ROOT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(key) = lookup("BRAVE_API_KEY") {
            self.search.brave_api_key = Some(key);
        }
        if let Some(model) = lookup("ALIN_MODEL") {
            self.default_model = model;
        }
        if let Some(provider) = lookup("ALIN_PROVIDER") {
            self.default_provider = Some(provider);
        }
        if let Some(root) = lookup("ALIN_WORKSPACE_ROOT") {
            self.sandbox.workspace_root = PathBuf::from(root);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".alin")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.default_temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "default_temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }
        if let Some(p) = &self.default_provider {
            if !matches!(p.to_ascii_lowercase().as_str(), "anthropic" | "openai") {
                return Err(ConfigError::ValidationError(format!(
                    "default_provider must be \"anthropic\" or \"openai\", got {p:?}"
                )));
            }
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError("agent.max_iterations must be > 0".into()));
        }
        if self.scan.max_iterations == 0 {
            return Err(ConfigError::ValidationError("scan.max_iterations must be > 0".into()));
        }
        if self.agent.retry_base_delay_ms > self.agent.retry_max_delay_ms {
            return Err(ConfigError::ValidationError(
                "agent.retry_base_delay_ms must not exceed agent.retry_max_delay_ms".into(),
            ));
        }
        if self.agent.tool_result_max_chars < 100 {
            return Err(ConfigError::ValidationError(
                "agent.tool_result_max_chars must be at least 100".into(),
            ));
        }
        if self.sandbox.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sandbox.command_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Whether any model provider has a key.
    pub fn has_api_key(&self) -> bool {
        self.providers.anthropic.api_key.is_some() || self.providers.openai.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_provider: None,
            default_max_tokens: default_max_tokens(),
            default_temperature: None,
            system_prompt: default_system_prompt(),
            providers: ProvidersConfig::default(),
            agent: AgentConfig::default(),
            scan: ScanConfig::default(),
            sandbox: SandboxConfig::default(),
            gateway: GatewayConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.tool_result_max_chars, 20_000);
        assert_eq!(config.sandbox.command_timeout_secs, 60);
        assert_eq!(config.sandbox.max_output_bytes, 100_000);
        assert_eq!(config.scan.max_iterations, 8);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmax_iterations = 3\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.max_retries, 3);
        assert_eq!(config.scan.model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "agent = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_values_rejected() {
        let config = AppConfig {
            default_temperature: Some(5.0),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            default_provider: Some("bedrock".into()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("BRAVE_API_KEY", "brave"),
            ("ALIN_MODEL", "gpt-4o"),
            ("ALIN_PROVIDER", "openai"),
            ("ALIN_WORKSPACE_ROOT", "/srv/alin"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.providers.anthropic.api_key.as_deref(), Some("sk-ant-test"));
        assert!(config.providers.openai.api_key.is_none());
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.default_provider.as_deref(), Some("openai"));
        assert_eq!(config.sandbox.workspace_root, PathBuf::from("/srv/alin"));
        assert!(config.has_api_key());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.providers.openai.api_key = Some("sk-secret".into());
        config.search.brave_api_key = Some("brave-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("brave-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-sonnet-4-20250514"));
        assert!(toml_str.contains("[sandbox]"));
    }
}
