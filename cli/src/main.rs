//! Rediacc CLI - authenticated queue execution and SSH access to remote machines

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rediacc_cli::cli::Cli;
use rediacc_cli::output::json::{error_body, format_error};

const DEBUG_ENV: &str = "REDIACC_DEBUG";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if json && let Ok(body) = format_error(&error_body(&e)) {
                println!("{body}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr: `RUST_LOG` wins, `REDIACC_DEBUG=1` means debug, else warn.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let debug = std::env::var(DEBUG_ENV)
            .is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"));
        EnvFilter::new(if debug { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
