//! `rediacc tunnel <team> <machine> --local P --remote Q`: forward a local
//! port to the machine until interrupted.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::CommandRunner;
use crate::commands::ssh::{MachineArgs, Prepared, exit_code, pin_seen_host_key, prepare};

/// Arguments for the tunnel command.
#[derive(Args)]
pub struct TunnelArgs {
    #[command(flatten)]
    pub target: MachineArgs,

    /// Local port to listen on
    #[arg(long, value_name = "PORT")]
    pub local: u16,

    /// Port on the machine to forward to
    #[arg(long, value_name = "PORT")]
    pub remote: u16,

    /// Remote host the machine forwards to
    #[arg(long, default_value = "127.0.0.1")]
    pub remote_host: String,
}

/// Run the tunnel command. Ctrl-C stops the tunnel and cleans up.
///
/// # Errors
///
/// API failures, missing keys and SSH setup failures.
pub async fn run(app: &AppContext, args: TunnelArgs) -> Result<ExitCode> {
    let Prepared {
        info,
        pins,
        session,
    } = prepare(app, &args.target).await?;
    let material = session.into_persistent()?;

    let mut ssh_args = material.options.clone();
    ssh_args.extend([
        "-N".to_string(),
        "-L".to_string(),
        forward_spec(args.local, &args.remote_host, args.remote),
        info.ssh_target(),
    ]);
    let arg_refs: Vec<&str> = ssh_args.iter().map(String::as_str).collect();
    let env_refs: Vec<(&str, &str)> = material
        .env
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    app.output.info(&format!(
        "Forwarding localhost:{} to {}:{} on {} (Ctrl-C to stop)",
        args.local, args.remote_host, args.remote, info.name
    ));
    let outcome = tokio::select! {
        status = app.runner.run_status("ssh", &arg_refs, &env_refs) => Some(status),
        _ = tokio::signal::ctrl_c() => None,
    };

    pin_seen_host_key(app, &info, &pins, material.policy, material.seen_host_key());
    material.cleanup();

    match outcome {
        Some(status) => Ok(exit_code(status.context("running ssh")?.code())),
        None => {
            app.output.info("Tunnel closed");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn forward_spec(local: u16, remote_host: &str, remote: u16) -> String {
    format!("127.0.0.1:{local}:{remote_host}:{remote}")
}
