//! `rediacc queue`: submit work to a machine's bridge and follow it.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::CredentialStore;
use crate::application::services::{connection, queue};
use crate::domain::queue::{
    CompletionResult, DEFAULT_PRIORITY, PollOptions, QueueVault, SubmitOptions, SubmitRequest,
};

/// Queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommand {
    /// Queue a task for a machine
    Submit(SubmitArgs),
    /// Show a task's status, optionally waiting for it to finish
    Trace(TraceArgs),
}

#[derive(Args)]
#[command(group(ArgGroup::new("payload").required(true).args(["function", "vault"])))]
pub struct SubmitArgs {
    /// Team owning the machine
    #[arg(long)]
    pub team: String,

    /// Target machine
    #[arg(long)]
    pub machine: String,

    /// Bridge to route through (defaults to the machine's bridge)
    #[arg(long)]
    pub bridge: Option<String>,

    /// Bridge function to run
    #[arg(long)]
    pub function: Option<String>,

    /// Function parameter as KEY=VALUE (repeatable)
    #[arg(long = "param", value_parser = parse_param, requires = "function")]
    pub params: Vec<(String, String)>,

    /// Task description (defaults to the function name)
    #[arg(long, requires = "function")]
    pub description: Option<String>,

    /// Raw instruction JSON, or @FILE to read it from a file
    #[arg(long)]
    pub vault: Option<String>,

    /// Priority, 1 (highest) to 5
    #[arg(long, default_value_t = DEFAULT_PRIORITY, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub priority: u8,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args)]
pub struct TraceArgs {
    /// Task identifier returned by `queue submit`
    pub task_id: String,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args)]
pub struct WaitArgs {
    /// Wait until the task finishes
    #[arg(long)]
    pub wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seconds between status checks
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,
}

impl WaitArgs {
    fn poll_options(&self, app: &AppContext) -> PollOptions {
        PollOptions {
            interval: self
                .poll_interval
                .map_or_else(|| app.config.poll_interval(), Duration::from_secs),
            timeout: self
                .timeout
                .map_or_else(|| app.config.task_timeout(), Duration::from_secs),
        }
    }
}

/// Run the queue command.
///
/// # Errors
///
/// API failures, unreadable `--vault` files, and `trace --wait` running
/// out of time.
pub async fn run(app: &AppContext, cmd: QueueCommand) -> Result<ExitCode> {
    match cmd {
        QueueCommand::Submit(args) => submit(app, args).await,
        QueueCommand::Trace(args) => trace(app, args).await,
    }
}

async fn submit(app: &AppContext, args: SubmitArgs) -> Result<ExitCode> {
    let gateway = app.gateway();

    let needs_machine = args.function.is_some() || args.bridge.is_none();
    let resolved = if needs_machine {
        let identity = app.credentials.identity()?;
        let universal_user = connection::universal_user(
            identity.vault_company.as_deref(),
            app.master_password(),
            &app.config.universal_user(),
        );
        Some(
            connection::resolve_machine(&gateway, &args.team, &args.machine, &universal_user)
                .await?,
        )
    } else {
        None
    };

    let vault = match (&args.function, &args.vault) {
        (Some(function), _) => {
            let mut builder = QueueVault::new(function, &args.team).priority(args.priority);
            for (key, value) in &args.params {
                builder = builder.param(key, value.as_str());
            }
            if let Some(text) = &args.description {
                builder = builder.description(text);
            }
            if let Some(r) = &resolved {
                builder = builder.machine(r.info.clone());
            }
            builder.to_json()
        }
        (None, Some(raw)) => read_vault_arg(raw)?,
        (None, None) => anyhow::bail!("either --function or --vault is required"),
    };

    let bridge = args
        .bridge
        .clone()
        .or_else(|| resolved.and_then(|r| r.bridge))
        .with_context(|| {
            format!(
                "machine '{}' has no bridge assigned; pass --bridge",
                args.machine
            )
        })?;

    let request = SubmitRequest {
        team: args.team,
        machine: args.machine,
        bridge,
        vault,
        priority: args.priority,
    };
    let poll = args.wait.poll_options(app);
    let opts = SubmitOptions {
        wait: args.wait.wait,
        poll_interval: poll.interval,
        timeout: poll.timeout,
        priority: args.priority,
    };

    let reporter = app.reporter();
    let outcome = queue::submit_and_wait(&gateway, &request, &opts, &reporter).await?;
    app.renderer().render_submit(&outcome)?;
    Ok(outcome
        .completion
        .as_ref()
        .map_or(ExitCode::SUCCESS, completion_exit_code))
}

async fn trace(app: &AppContext, args: TraceArgs) -> Result<ExitCode> {
    let gateway = app.gateway();
    let result = if args.wait.wait {
        let reporter = app.reporter();
        let poll = args.wait.poll_options(app);
        queue::poll_until_terminal(&gateway, &args.task_id, &poll, &reporter)
            .await?
            .require_finished(poll.timeout)?
    } else {
        queue::trace(&gateway, &args.task_id).await?
    };
    app.renderer().render_trace(&result)?;
    Ok(if args.wait.wait {
        completion_exit_code(&result)
    } else {
        ExitCode::SUCCESS
    })
}

/// Success only for a task that finished successfully.
fn completion_exit_code(result: &CompletionResult) -> ExitCode {
    if result.completed && result.status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_vault_arg(raw: &str) -> Result<String> {
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?
        }
        None => raw.to_string(),
    };
    serde_json::from_str::<serde_json::Value>(&text).context("--vault is not valid JSON")?;
    Ok(text)
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
