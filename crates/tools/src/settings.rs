//! Resource bounds shared by the tool catalogue.

use std::time::Duration;

use alin_config::AppConfig;

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub command_timeout: Duration,
    /// Cap for each of stdout and stderr.
    pub max_output_bytes: usize,
    pub file_read_max_bytes: usize,
    pub scan_max_depth: usize,
    pub scan_file_bytes: usize,
    pub scan_total_bytes: usize,
    pub search_max_matches: usize,
    pub brave_api_key: Option<String>,
    pub search_max_results: usize,
    pub fetch_max_chars: usize,
}

impl ToolSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let sandbox = &config.sandbox;
        Self {
            command_timeout: Duration::from_secs(sandbox.command_timeout_secs),
            max_output_bytes: sandbox.max_output_bytes,
            file_read_max_bytes: sandbox.file_read_max_bytes,
            scan_max_depth: sandbox.scan_max_depth,
            scan_file_bytes: sandbox.scan_file_bytes,
            scan_total_bytes: sandbox.scan_total_bytes,
            search_max_matches: sandbox.search_max_matches,
            brave_api_key: config.search.brave_api_key.clone(),
            search_max_results: config.search.max_results,
            fetch_max_chars: config.search.fetch_max_chars,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
