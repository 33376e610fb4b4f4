//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;

/// Queue work and open SSH sessions on Rediacc machines
#[derive(Parser)]
#[command(
    name = "rediacc",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (any non-empty NO_COLOR also disables it)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Master password for encrypted vault fields
    #[arg(long, global = true, env = "REDIACC_MASTER_PASSWORD", hide_env_values = true)]
    pub master_password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in and store a session token
    Login(commands::login::LoginArgs),

    /// End the session and forget the stored token
    Logout,

    /// Show the current session
    Status,

    /// Submit and trace queue tasks
    #[command(subcommand)]
    Queue(commands::queue::QueueCommand),

    /// Open a shell or run a command on a machine
    Ssh(commands::ssh::SshArgs),

    /// Forward a local port to a machine
    Tunnel(commands::tunnel::TunnelArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be built or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            master_password,
            command,
        } = self;
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            master_password,
        })?;

        match command {
            Command::Login(args) => commands::login::run(&app, args).await,
            Command::Logout => commands::logout::run(&app).await,
            Command::Status => commands::status::run(&app),
            Command::Queue(cmd) => commands::queue::run(&app, cmd).await,
            Command::Ssh(args) => commands::ssh::run(&app, args).await,
            Command::Tunnel(args) => commands::tunnel::run(&app, args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
        }
    }
}
