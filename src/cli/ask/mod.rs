//! Ask command - answers one question and prints JSON to stdout

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use futures::StreamExt;
use tokio::signal;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::llm::ConversationTurn;
use crate::domain::pipeline::StreamEvent;
use crate::infrastructure::observability::{init_metrics, init_tracing, shutdown_tracing};

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Tenant the caller belongs to
    #[arg(long)]
    pub tenant: String,

    /// Caller role used for visibility filtering
    #[arg(long)]
    pub role: String,

    /// JSON file with prior turns: `[{"role": "user", "content": "..."}]`
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Print one JSON event per line as the answer is generated
    #[arg(long)]
    pub stream: bool,

    /// The question
    pub question: String,
}

/// Run the ask command
pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Invalid configuration")?;
    init_tracing(&config.logging, &config.observability.tracing);
    init_metrics(&config.observability.metrics);

    let history = match &args.history {
        Some(path) => load_history(path).await?,
        None => Vec::new(),
    };

    let orchestrator = crate::build_orchestrator(&config).await?;
    info!(tenant = %args.tenant, role = %args.role, stream = args.stream, "Answering question");

    let result = if args.stream {
        stream_answer(&orchestrator, args, history).await
    } else {
        match orchestrator
            .answer(&args.tenant, &args.role, &args.question, &history)
            .await
        {
            Ok(response) => print_json(&response),
            Err(e) => {
                print_json(&serde_json::json!({
                    "error": e.kind(),
                    "stage": e.stage(),
                    "message": e.user_message(),
                }))?;
                Err(e.into())
            }
        }
    };

    shutdown_tracing();
    result
}

async fn stream_answer(
    orchestrator: &crate::infrastructure::services::GenerationOrchestrator,
    args: AskArgs,
    history: Vec<ConversationTurn>,
) -> anyhow::Result<()> {
    let mut events = orchestrator.answer_stream(args.tenant, args.role, args.question, history);
    let mut failed = false;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    failed |= matches!(event, StreamEvent::Error { .. });
                    print_json_line(&event)?;
                }
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Interrupted, cancelling generation");
                break;
            }
        }
    }

    if failed {
        anyhow::bail!("answer stream ended with an error");
    }
    Ok(())
}

async fn load_history(path: &Path) -> anyhow::Result<Vec<ConversationTurn>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read history file {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid history file {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn print_json_line<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
