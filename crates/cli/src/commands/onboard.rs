//! `alin onboard`: write a default config and create the workspace root.

use std::path::Path;

use alin_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Alin setup");
    println!("==========\n");

    create_dir(&config_dir, "config directory")?;

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created {}", config_path.display());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    create_dir(&config.sandbox.workspace_root, "workspace root")?;

    println!("\nNext steps:");
    if config.has_api_key() {
        println!("   Run: alin chat -m \"list files in .\"");
    } else {
        println!("   1. Export ANTHROPIC_API_KEY or OPENAI_API_KEY, or add a key to");
        println!("      {}", config_path.display());
        println!("   2. Run: alin chat -m \"list files in .\"");
    }
    println!();
    Ok(())
}

fn create_dir(path: &Path, what: &str) -> std::io::Result<()> {
    if path.exists() {
        println!("  {what} exists: {}", path.display());
    } else {
        std::fs::create_dir_all(path)?;
        println!("  Created {what}: {}", path.display());
    }
    Ok(())
}
