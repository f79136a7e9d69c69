//! Murmur local harness.
//!
//! Binary name: `murmur`
//!
//! Loads the runtime config, wires the bootstrap and echo plugins into an
//! `AgentRuntime`, then feeds stdin lines through the message orchestrator
//! and prints whatever the agent delivers.

mod echo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use murmur_core::action::callback_fn;
use murmur_core::bootstrap::BootstrapPlugin;
use murmur_core::plugin::Plugin;
use murmur_core::repository::BoxMemoryRepository;
use murmur_core::{AgentRuntime, HandleOptions, MessageOrchestrator};
use murmur_infra::InMemoryRepository;
use murmur_infra::config::{default_config_path, load_runtime_config, resolve_response_timeout};
use murmur_observe::{TracingOptions, init_tracing, shutdown_tracing};
use murmur_types::memory::{ChannelType, Content, Memory};

use echo::EchoPlugin;

/// Talk to a Murmur agent from the terminal.
#[derive(Debug, Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.murmur/config.toml)
    #[arg(long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Export spans through OpenTelemetry (stdout exporter)
    #[arg(long)]
    otel: bool,

    /// Conversation id (random when omitted)
    #[arg(long)]
    room: Option<Uuid>,

    /// Channel type reported for every message
    #[arg(long, default_value = "dm")]
    channel: ChannelType,

    /// Per-message deadline in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Use the multi-step strategy
    #[arg(long)]
    multi_step: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        default_filter: murmur_observe::tracing_setup::filter_for_verbosity(cli.verbose, cli.quiet)
            .to_string(),
        json: cli.json_logs,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_runtime_config(&config_path).await;
    if cli.multi_step {
        config.runtime.use_multi_step = true;
    }
    let timeout = resolve_response_timeout(&config, cli.timeout);

    let runtime = Arc::new(AgentRuntime::new(
        Uuid::now_v7(),
        config,
        BoxMemoryRepository::new(InMemoryRepository::new()),
    ));
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(EchoPlugin), Arc::new(BootstrapPlugin)];
    runtime
        .initialize(plugins, false)
        .await
        .context("failed to load plugins")?;
    info!(plugins = ?runtime.plugin_names(), "Runtime ready");

    let orchestrator = MessageOrchestrator::new(Arc::clone(&runtime)).with_timeout(timeout);
    let room = cli.room.unwrap_or_else(Uuid::now_v7);
    let user = Uuid::now_v7();
    let agent_name = runtime.character().name.clone();

    let callback = callback_fn(move |content: Content| {
        let agent_name = agent_name.clone();
        async move {
            if !content.text.is_empty() {
                println!("{} {}", style(format!("{agent_name}:")).cyan().bold(), content.text);
            }
            Vec::new()
        }
    });

    println!(
        "{} room {} (ctrl-d to quit)",
        style("murmur").bold(),
        style(room).dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let mut content = Content::text(text);
        content.source = Some("cli".to_string());
        content.channel_type = Some(cli.channel);
        let message = Memory::new(user, runtime.agent_id(), room, content);

        let options = HandleOptions {
            callback: Some(callback.clone()),
            ..Default::default()
        };
        match orchestrator.handle_message(message, options).await {
            Ok(result) if !result.did_respond => {
                println!("{}", style("(no response)").dim());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Message failed");
                eprintln!("{} {err}", style("error:").red().bold());
            }
        }
    }

    runtime.stop().await;
    Ok(())
}
