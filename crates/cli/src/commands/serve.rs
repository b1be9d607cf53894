//! `alin serve`: start the HTTP gateway.

use alin_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() && config.providers.openai.api_url.is_none() {
        eprintln!("  warning: no provider key configured; /v1/chat will reject requests");
    }
    println!("Alin gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Workspaces: {}", config.sandbox.workspace_root.display());

    alin_gateway::start(config).await
}
