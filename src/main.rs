mod agent;
mod completion;
mod config;
mod events;
mod session;
mod tool_host;
mod tool_registry;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use agent::Agent;
use completion::HttpCompletionClient;
use config::Config;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Rust agent runtime for the Workbench coding assistant")]
struct Cli {
    /// Path to TOML config file.
    #[arg(
        long,
        global = true,
        env = "WORKBENCH_RS_CONFIG",
        default_value = "workbench-rs.toml"
    )]
    config: PathBuf,

    /// Override the workspace root tools operate in.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Override completion service base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override completion service API key.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Override completion model id.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Log level filter, e.g. info,debug,trace.
    #[arg(long, global = true, env = "WORKBENCH_RS_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommand {
    /// Run an interactive session reading user turns from stdin.
    Run,
    /// Send a single message and print the final reply.
    Send(SendArgs),
    /// Print the registered tool catalog.
    Tools(ToolsArgs),
}

#[derive(Debug, Clone, Args)]
struct SendArgs {
    /// Message to send to the agent.
    #[arg(long)]
    message: String,
    /// Emit the reply as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct ToolsArgs {
    /// Emit the catalog as pretty-printed JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;

    let mut config = Config::load(&cli.config)?;
    config.apply_cli_overrides(
        cli.base_url.as_deref(),
        cli.api_key.as_deref(),
        cli.model.as_deref(),
        cli.workspace.as_deref(),
    );
    config.validate()?;

    match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Run => run_interactive(config).await,
        CliCommand::Send(args) => run_send(config, args).await,
        CliCommand::Tools(args) => {
            print_tools(&args);
            Ok(())
        }
    }
}

fn build_agent(config: &Config) -> Result<Agent> {
    let client = Arc::new(HttpCompletionClient::new(config.completion.clone())?);
    Ok(Agent::new(&config.runtime, client))
}

async fn run_interactive(config: Config) -> Result<()> {
    let agent = build_agent(&config)?;
    spawn_event_logger(&agent);
    info!(
        workspace = %config.runtime.workspace_root.display(),
        model = %config.completion.model,
        "interactive session started (ctrl-d to exit)"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }
        match agent.send_turn(&line, None).await {
            Ok(reply) => {
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
            Err(err) => {
                eprintln!("turn failed: {err:#}");
            }
        }
    }
}

async fn run_send(config: Config, args: SendArgs) -> Result<()> {
    let agent = build_agent(&config)?;
    spawn_event_logger(&agent);
    let reply = agent.send_turn(&args.message, None).await?;
    if args.json {
        println!("{}", serde_json::json!({ "reply": reply }));
    } else {
        println!("{reply}");
    }
    Ok(())
}

fn print_tools(args: &ToolsArgs) {
    let catalog = tool_registry::wire_catalog(&tool_registry::registry());
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&catalog).unwrap_or_default()
        );
        return;
    }
    for spec in tool_registry::registry() {
        println!("{:<16} {}", spec.name, spec.description);
    }
}

/// Mirrors tool side effects into the log stream so headless runs still
/// show what the agent touched.
fn spawn_event_logger(agent: &Agent) {
    let mut rx = agent.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let Ok(payload) = serde_json::to_string(&event) {
                info!(target: "workbench::events", "{payload}");
            }
        }
    });
}

fn init_logging(filter: &str) -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_target(false)
        .init();
    Ok(())
}
