//! `alin chat`: run the agent loop locally, printing events as they arrive.
//!
//! With `-m` one message is sent and the command exits; otherwise lines read
//! from stdin continue the same transcript until `exit` or end of input.

use std::io::Write;
use std::sync::Arc;

use alin_agent::{LoopEvent, LoopRequest, LoopRun};
use alin_config::AppConfig;
use alin_core::{ConversationTurn, ProviderKind};
use alin_gateway::Runtime;
use alin_gateway::api_v1::DEFAULT_OWNER;
use alin_tools::tool_context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct ChatArgs {
    pub message: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub workspace: String,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let model = args.model.unwrap_or_else(|| config.default_model.clone());
    let runtime = Runtime::from_config(config);

    let explicit = args.provider.as_deref().map(str::parse::<ProviderKind>).transpose()?;
    let provider = runtime.providers().resolve(explicit, &model).map_err(|e| {
        format!("{e}\n  Run `alin onboard` or export an API key, then try again.")
    })?;
    let workspace = runtime.workspaces().open(&args.workspace, DEFAULT_OWNER).await?;
    let agent = Arc::new(runtime.agent(provider, None));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    let ctx = tool_context(&workspace, cancel.clone());

    let mut transcript = Vec::new();

    if let Some(message) = args.message {
        transcript.push(ConversationTurn::user(message));
        let run = turn(&agent, &runtime, &model, transcript, &ctx).await;
        return match run.outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    eprintln!("Alin chat  model={model}  workspace={}", workspace.root.display());
    eprintln!("Type a message and press Enter; `exit` quits.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("you > ");
        std::io::stderr().flush()?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" || cancel.is_cancelled() {
            break;
        }
        transcript.push(ConversationTurn::user(line));
        let run = turn(&agent, &runtime, &model, transcript, &ctx).await;
        transcript = run.transcript;
    }
    Ok(())
}

/// One loop run, with its events printed as they stream in.
async fn turn(
    agent: &alin_agent::AgentLoop,
    runtime: &Runtime,
    model: &str,
    transcript: Vec<ConversationTurn>,
    ctx: &alin_core::ToolContext,
) -> LoopRun {
    let mut request = LoopRequest::new(model, transcript).streaming(true);
    request.system_prompt = runtime.system_prompt();

    let (tx, mut rx) = mpsc::channel(256);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });
    let run = agent.run(request, ctx, Some(tx)).await;
    let _ = printer.await;
    run
}

fn print_event(event: &LoopEvent) {
    match event {
        LoopEvent::Start { .. } | LoopEvent::SignatureDelta { .. } => {}
        LoopEvent::TextDelta { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        LoopEvent::ThinkingDelta { text } => eprint!("{text}"),
        LoopEvent::ToolUse { name, input, .. } => eprintln!("\n  [tool] {name} {input}"),
        LoopEvent::ToolResult {
            name, content, is_error, ..
        } => {
            let status = if *is_error { "failed" } else { "ok" };
            let preview: String = content.lines().next().unwrap_or_default().chars().take(120).collect();
            eprintln!("  [tool] {name} {status}: {preview}");
        }
        LoopEvent::Error { kind, message, .. } => eprintln!("\n  [error] {kind}: {message}"),
        LoopEvent::Done { iterations, usage, .. } => {
            println!();
            eprintln!(
                "  [done] {iterations} tool rounds, {} in / {} out tokens",
                usage.input_tokens, usage.output_tokens
            );
        }
    }
}
