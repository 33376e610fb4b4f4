//! `rediacc ssh <team> <machine> [-- cmd]`: open a shell or run a command
//! on a machine using its team's SSH key.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use zeroize::Zeroizing;

use crate::app::AppContext;
use crate::application::ports::{CommandRunner, CredentialStore};
use crate::application::services::connection;
use crate::domain::machine::MachineConnectionInfo;
use crate::domain::ssh::{HostKeyPolicy, KnownHostsEntry, wrap_as_user};
use crate::infra::ssh::{KnownHostsStore, SshSession, SshSessionManager, SshSessionRequest};

/// Target selection shared by `ssh` and `tunnel`.
#[derive(Args)]
pub struct MachineArgs {
    /// Team owning the machine
    pub team: String,

    /// Machine to connect to
    pub machine: String,

    /// Use a temporary key file instead of ssh-agent
    #[arg(long)]
    pub no_agent: bool,

    /// Drop the locally pinned host key before connecting
    #[arg(long)]
    pub forget_host_key: bool,
}

/// Arguments for the ssh command.
#[derive(Args)]
pub struct SshArgs {
    #[command(flatten)]
    pub target: MachineArgs,

    /// Command to run as the universal user (interactive shell when omitted)
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// An open session plus what is needed to pin its host key afterwards.
pub(crate) struct Prepared {
    pub info: MachineConnectionInfo,
    pub pins: KnownHostsStore,
    pub session: SshSession,
}

/// Resolves the machine, fetches the team key and opens a session.
pub(crate) async fn prepare(app: &AppContext, target: &MachineArgs) -> Result<Prepared> {
    let gateway = app.gateway();
    let identity = app.credentials.identity()?;
    let universal_user = connection::universal_user(
        identity.vault_company.as_deref(),
        app.master_password(),
        &app.config.universal_user(),
    );

    let resolved =
        connection::resolve_machine(&gateway, &target.team, &target.machine, &universal_user)
            .await?;
    let private_key = Zeroizing::new(connection::team_ssh_key(&gateway, &target.team).await?);
    let info = resolved.info;

    let pins = KnownHostsStore::new()?;
    if target.forget_host_key && pins.remove(&info.ip)? {
        app.output
            .info(&format!("Forgot pinned host key for {}", info.ip));
    }
    let host_entry = match &info.host_entry {
        Some(line) => Some(line.clone()),
        None => pins.lookup(&info.ip)?.map(|e| e.to_line()),
    };

    let session = SshSessionManager::new(&app.runner, &app.telemetry)
        .open(&SshSessionRequest {
            private_key,
            host_entry,
            host_aliases: vec![info.name.clone()],
            prefer_agent: app.config.ssh.prefer_agent && !target.no_agent,
        })
        .await?;

    Ok(Prepared {
        info,
        pins,
        session,
    })
}

/// Pins the key `ssh` accepted on first contact.
pub(crate) fn pin_seen_host_key(
    app: &AppContext,
    info: &MachineConnectionInfo,
    pins: &KnownHostsStore,
    policy: HostKeyPolicy,
    seen: Option<KnownHostsEntry>,
) {
    if policy != HostKeyPolicy::AcceptNew {
        return;
    }
    let Some(mut seen) = seen else {
        return;
    };
    seen.add_aliases([info.ip.as_str(), info.name.as_str()]);
    match pins.remember(&seen) {
        Ok(()) => app
            .output
            .info(&format!("Pinned host key for {} ({})", info.name, info.ip)),
        Err(e) => tracing::warn!("cannot pin host key: {e:#}"),
    }
}

/// Run the ssh command. The exit code is the remote command's.
///
/// # Errors
///
/// API failures, missing keys and SSH setup failures.
pub async fn run(app: &AppContext, args: SshArgs) -> Result<ExitCode> {
    let Prepared {
        info,
        pins,
        session,
    } = prepare(app, &args.target).await?;

    let remote = (!args.command.is_empty())
        .then(|| wrap_as_user(&info.universal_user.name, &args.command.join(" ")));
    let ssh_args = session.ssh_args(&info.ssh_target(), remote.as_deref());
    let env = session.env();

    let arg_refs: Vec<&str> = ssh_args.iter().map(String::as_str).collect();
    let env_refs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let status = app.runner.run_status("ssh", &arg_refs, &env_refs).await;

    pin_seen_host_key(app, &info, &pins, session.policy(), session.seen_host_key());
    session.close(&app.runner).await;

    let status = status.context("running ssh")?;
    Ok(exit_code(status.code()))
}

/// Maps the remote exit status onto ours; signals become 255 like ssh's own.
pub(crate) fn exit_code(code: Option<i32>) -> ExitCode {
    match code {
        Some(0) => ExitCode::SUCCESS,
        Some(c) => ExitCode::from(u8::try_from(c).unwrap_or(255)),
        None => ExitCode::from(255),
    }
}
