#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// runlog-cli/src/main.rs
// ============================================================================
// Module: Run Event Substrate CLI Entry Point
// Description: Command dispatcher for serving the substrate and driving it
//              from an operator's terminal.
// Purpose: One binary covering both server operation and day-to-day
//          run/event/tool/approval inspection against a running instance.
// Dependencies: clap, runlog-config, runlog-server, serde_json, thiserror,
//               tokio.
// ============================================================================

//! ## Overview
//! `runlog serve` boots the HTTP/SSE server in this process; every other
//! subcommand is a thin client against an already-running instance,
//! addressed by `--server` (default `http://127.0.0.1:8080`) and
//! authenticated by `--token` or the `RUNLOG_TOKEN` environment variable.

mod auth;
mod client;
mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use client::AppendEventRequest;
use client::CreateRunRequest;
use client::InvokeToolRequest;
use client::RunlogClient;
use serde_json::Value;
use thiserror::Error;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "runlog", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Base URL of a running runlog-server instance.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    server: String,
    /// Bearer token; falls back to `RUNLOG_TOKEN` when absent.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP/SSE server in this process.
    Serve(ServeArgs),
    /// Run lifecycle operations.
    Run {
        /// Selected run subcommand.
        #[command(subcommand)]
        command: RunCommand,
    },
    /// Event append/list operations.
    Event {
        /// Selected event subcommand.
        #[command(subcommand)]
        command: EventCommand,
    },
    /// Tool discovery and invocation.
    Tool {
        /// Selected tool subcommand.
        #[command(subcommand)]
        command: ToolCommand,
    },
    /// Approval decisions.
    Approval {
        /// Selected approval subcommand.
        #[command(subcommand)]
        command: ApprovalCommand,
    },
    /// Operational endpoints.
    System {
        /// Selected system subcommand.
        #[command(subcommand)]
        command: SystemCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeArgs {
    /// Optional config file path (defaults to `runlog.toml` or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Address to bind the HTTP/SSE server on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
    /// Path to the `SQLite` database file.
    #[arg(long, default_value = "runlog.db")]
    db: PathBuf,
}

/// Run subcommands.
#[derive(Subcommand, Debug)]
enum RunCommand {
    /// Create a run under a thread.
    Create {
        /// Owning thread id.
        #[arg(long)]
        thread_id: String,
        /// Executor version at run start.
        #[arg(long)]
        executor_version: String,
    },
    /// Fetch a run by id.
    Get {
        /// Run id.
        run_id: String,
        /// Include aggregate metrics in the response.
        #[arg(long)]
        summary: bool,
    },
    /// List runs in a thread.
    List {
        /// Owning thread id.
        thread_id: String,
    },
    /// Transition a run's status.
    Status {
        /// Run id.
        run_id: String,
        /// New status: running, completed, cancelled, failed,
        /// waiting_approval.
        status: String,
    },
}

/// Event subcommands.
#[derive(Subcommand, Debug)]
enum EventCommand {
    /// Append an event to a run.
    Append {
        /// Owning run id.
        run_id: String,
        /// Event kind.
        kind: String,
        /// Canonical JSON payload.
        payload: String,
    },
    /// List events for a run.
    List {
        /// Owning run id.
        run_id: String,
        /// Only events with `seq > after_seq`.
        #[arg(long, default_value_t = 0)]
        after_seq: u64,
    },
}

/// Tool subcommands.
#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// List every installed tool manifest.
    List,
    /// Invoke a tool.
    Invoke {
        /// Owning run id.
        #[arg(long)]
        run_id: String,
        /// Owning project id.
        #[arg(long)]
        project_id: String,
        /// Tool id to invoke.
        #[arg(long)]
        tool_id: String,
        /// Canonical JSON inputs.
        #[arg(long)]
        inputs: String,
    },
}

/// Approval subcommands.
#[derive(Subcommand, Debug)]
enum ApprovalCommand {
    /// List approvals recorded for a run.
    List {
        /// Owning run id.
        run_id: String,
    },
    /// Approve a pending approval.
    Approve {
        /// Approval id.
        approval_id: String,
    },
    /// Deny a pending approval.
    Deny {
        /// Approval id.
        approval_id: String,
    },
}

/// System subcommands.
#[derive(Subcommand, Debug)]
enum SystemCommand {
    /// Checks store connectivity.
    Health,
    /// Returns the counter/gauge snapshot.
    Stats,
    /// Returns the operator-visible configuration snapshot.
    Config,
}

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{0}")]
struct CliError(String);

impl From<client::ClientError> for CliError {
    fn from(err: client::ClientError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("invalid JSON: {err}"))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    if let Commands::Serve(args) = cli.command {
        serve::run(args.config, &args.bind, args.db).await.map_err(|err| CliError(err.to_string()))?;
        return Ok(ExitCode::SUCCESS);
    }

    let token = cli.token.or_else(|| std::env::var("RUNLOG_TOKEN").ok());
    let client = RunlogClient::new(cli.server, token.as_deref())?;

    let response = match cli.command {
        Commands::Serve(_) => unreachable!("handled above"),
        Commands::Run { command } => command_run(&client, command).await?,
        Commands::Event { command } => command_event(&client, command).await?,
        Commands::Tool { command } => command_tool(&client, command).await?,
        Commands::Approval { command } => command_approval(&client, command).await?,
        Commands::System { command } => command_system(&client, command).await?,
    };
    print_json(&response);
    Ok(ExitCode::SUCCESS)
}

async fn command_run(client: &RunlogClient, command: RunCommand) -> CliResult<Value> {
    match command {
        RunCommand::Create { thread_id, executor_version } => {
            let body = CreateRunRequest {
                thread_id,
                model_config: None,
                tool_versions: std::collections::BTreeMap::new(),
                executor_version,
            };
            Ok(client.create_run(&body).await?)
        }
        RunCommand::Get { run_id, summary } => {
            if summary {
                Ok(client.get_run_summary(&run_id).await?)
            } else {
                Ok(client.get_run(&run_id).await?)
            }
        }
        RunCommand::List { thread_id } => Ok(client.list_runs_in_thread(&thread_id).await?),
        RunCommand::Status { run_id, status } => Ok(client.update_run_status(&run_id, &status).await?),
    }
}

async fn command_event(client: &RunlogClient, command: EventCommand) -> CliResult<Value> {
    match command {
        EventCommand::Append { run_id, kind, payload } => {
            let payload: Value = serde_json::from_str(&payload)?;
            let body = AppendEventRequest { kind, payload, parent_event_id: None, correlation_id: None };
            Ok(client.append_event(&run_id, &body).await?)
        }
        EventCommand::List { run_id, after_seq } => Ok(client.list_events(&run_id, after_seq).await?),
    }
}

async fn command_tool(client: &RunlogClient, command: ToolCommand) -> CliResult<Value> {
    match command {
        ToolCommand::List => Ok(client.list_tools().await?),
        ToolCommand::Invoke { run_id, project_id, tool_id, inputs } => {
            let inputs: Value = serde_json::from_str(&inputs)?;
            let body = InvokeToolRequest { run_id, project_id, tool_id, version: None, inputs };
            Ok(client.invoke_tool(&body).await?)
        }
    }
}

async fn command_approval(client: &RunlogClient, command: ApprovalCommand) -> CliResult<Value> {
    match command {
        ApprovalCommand::List { run_id } => Ok(client.list_approvals(&run_id).await?),
        ApprovalCommand::Approve { approval_id } => Ok(client.approve(&approval_id).await?),
        ApprovalCommand::Deny { approval_id } => Ok(client.deny(&approval_id).await?),
    }
}

async fn command_system(client: &RunlogClient, command: SystemCommand) -> CliResult<Value> {
    match command {
        SystemCommand::Health => Ok(client.system_health().await?),
        SystemCommand::Stats => Ok(client.system_stats().await?),
        SystemCommand::Config => Ok(client.system_config().await?),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
