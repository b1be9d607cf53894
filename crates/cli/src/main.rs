//! Alin CLI: the main entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway
//! - `chat`    Run the agent against a local workspace
//! - `onboard` Write a default config and create the workspace root

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "alin", about = "Alin: a tool-using AI agent with a sandboxed workspace", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agent; interactive unless --message is given
    Chat {
        /// Send a single message and exit
        #[arg(short, long)]
        message: Option<String>,

        /// Model to use (defaults to `default_model`)
        #[arg(long, env = "ALIN_MODEL")]
        model: Option<String>,

        /// Force a provider: anthropic or openai
        #[arg(long)]
        provider: Option<String>,

        /// Workspace id under the sandbox root
        #[arg(short, long, default_value = "cli")]
        workspace: String,
    },

    /// Write a default config and create the workspace root
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            model,
            provider,
            workspace,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                message,
                model,
                provider,
                workspace,
            })
            .await?
        }
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
