//! Ephemeral SSH identities.
//!
//! [`SshSessionManager::open`] turns a stored private key into either an
//! agent-backed identity or a private temp key file, plus a dedicated
//! known-hosts file. Everything it creates is removed by
//! [`SshSession::close`], or by drop if the caller bails out early.

pub mod agent;
pub mod known_hosts;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use tempfile::TempPath;
use zeroize::Zeroizing;

use crate::application::ports::{CommandRunner, TelemetryEvent, TelemetrySink};
use crate::domain::error::ClientError;
use crate::domain::ssh::{
    AgentEnv, HostKeyPolicy, KnownHostsEntry, normalize_private_key, ssh_options,
};
use crate::infra::fs::set_mode;

pub use agent::AgentHandle;
pub use known_hosts::KnownHostsStore;

pub const SSH_SESSION_OPERATION: &str = "ssh.session";

/// Inputs to [`SshSessionManager::open`].
#[derive(Clone, Default)]
pub struct SshSessionRequest {
    /// PEM text or base64 of PEM text.
    pub private_key: Zeroizing<String>,
    /// Pinned `known_hosts` line for the target, if one is known.
    pub host_entry: Option<String>,
    /// Extra names the pinned key should also match.
    pub host_aliases: Vec<String>,
    pub prefer_agent: bool,
}

pub struct SshSessionManager<'a, R, T> {
    runner: &'a R,
    telemetry: &'a T,
    agent_program: String,
    add_program: String,
    temp_dir: PathBuf,
}

impl<'a, R: CommandRunner, T: TelemetrySink> SshSessionManager<'a, R, T> {
    #[must_use]
    pub fn new(runner: &'a R, telemetry: &'a T) -> Self {
        Self {
            runner,
            telemetry,
            agent_program: "ssh-agent".to_string(),
            add_program: "ssh-add".to_string(),
            temp_dir: std::env::temp_dir(),
        }
    }

    #[must_use]
    pub fn with_programs(mut self, agent_program: &str, add_program: &str) -> Self {
        self.agent_program = agent_program.to_string();
        self.add_program = add_program.to_string();
        self
    }

    #[must_use]
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Prepares an identity for `request`.
    ///
    /// The agent path is tried first when preferred; any failure there falls
    /// through to a key file.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidKeyMaterial`] for an unusable key,
    /// [`ClientError::SshSetupFailed`] for a malformed host entry or when
    /// the key file cannot be written.
    pub async fn open(&self, request: &SshSessionRequest) -> Result<SshSession, ClientError> {
        let started = Instant::now();
        let result = self.open_inner(request).await;
        self.telemetry.record(&TelemetryEvent::from_result(
            SSH_SESSION_OPERATION,
            started.elapsed(),
            &result,
        ));
        result
    }

    async fn open_inner(&self, request: &SshSessionRequest) -> Result<SshSession, ClientError> {
        let key = Zeroizing::new(normalize_private_key(&request.private_key)?);

        let pinned = match &request.host_entry {
            Some(line) => {
                let mut entry = KnownHostsEntry::parse(line)?;
                entry.add_aliases(request.host_aliases.iter().map(String::as_str));
                Some(entry)
            }
            None => None,
        };
        let policy = if pinned.is_some() {
            HostKeyPolicy::Pinned
        } else {
            HostKeyPolicy::AcceptNew
        };
        let known_hosts = self
            .write_known_hosts(pinned.as_ref())
            .map_err(setup_failed)?;

        if request.prefer_agent {
            match agent::start(self.runner, &self.agent_program, &self.add_program, &key).await {
                Ok(handle) => {
                    tracing::debug!(pid = handle.env().pid, "ssh key loaded into agent");
                    return Ok(SshSession {
                        policy,
                        agent: Some(handle),
                        key_file: None,
                        known_hosts,
                    });
                }
                Err(e) => tracing::debug!("ssh-agent unavailable, using key file: {e:#}"),
            }
        }

        let key_file = self.write_key_file(&key).map_err(setup_failed)?;
        Ok(SshSession {
            policy,
            agent: None,
            key_file: Some(key_file),
            known_hosts,
        })
    }

    fn write_known_hosts(&self, pinned: Option<&KnownHostsEntry>) -> anyhow::Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("rediacc-known-hosts-")
            .tempfile_in(&self.temp_dir)
            .context("creating known_hosts file")?;
        set_mode(file.path(), 0o600)?;
        if let Some(entry) = pinned {
            file.write_all(entry.to_line().as_bytes())?;
            file.flush()?;
        }
        Ok(file.into_temp_path())
    }

    fn write_key_file(&self, key: &str) -> anyhow::Result<TempPath> {
        let mut file = tempfile::Builder::new()
            .prefix("rediacc-key-")
            .tempfile_in(&self.temp_dir)
            .context("creating key file")?;
        set_mode(file.path(), 0o600)?;
        file.write_all(key.as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path();

        let written = Zeroizing::new(
            std::fs::read_to_string(&path).context("reading back key file")?,
        );
        anyhow::ensure!(written.as_str() == key, "key file content mismatch");
        Ok(path)
    }
}

fn setup_failed(err: anyhow::Error) -> ClientError {
    ClientError::SshSetupFailed(format!("{err:#}"))
}

/// An open identity plus its known-hosts file.
///
/// Temp files are deleted and the agent killed when dropped; prefer
/// [`SshSession::close`], which stops the agent asynchronously.
#[derive(Debug)]
pub struct SshSession {
    policy: HostKeyPolicy,
    agent: Option<AgentHandle>,
    key_file: Option<TempPath>,
    known_hosts: TempPath,
}

impl SshSession {
    #[must_use]
    pub fn policy(&self) -> HostKeyPolicy {
        self.policy
    }

    #[must_use]
    pub fn is_agent_backed(&self) -> bool {
        self.agent.is_some()
    }

    #[must_use]
    pub fn known_hosts_path(&self) -> &Path {
        &self.known_hosts
    }

    #[must_use]
    pub fn key_file_path(&self) -> Option<&Path> {
        self.key_file.as_deref()
    }

    /// `-o`/`-i` options for `ssh`.
    #[must_use]
    pub fn options(&self) -> Vec<String> {
        let key = self
            .key_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        ssh_options(
            self.policy,
            &self.known_hosts.to_string_lossy(),
            key.as_deref(),
        )
    }

    /// Extra environment for `ssh` (the agent socket, when agent-backed).
    #[must_use]
    pub fn env(&self) -> Vec<(String, String)> {
        self.agent.as_ref().map(AgentHandle::vars).unwrap_or_default()
    }

    /// Full `ssh` argument list for `target`, optionally running `command`.
    #[must_use]
    pub fn ssh_args(&self, target: &str, command: Option<&str>) -> Vec<String> {
        let mut args = self.options();
        args.push(target.to_string());
        if let Some(cmd) = command {
            args.push(cmd.to_string());
        }
        args
    }

    /// Host key recorded by `ssh` under `accept-new`, if any.
    #[must_use]
    pub fn seen_host_key(&self) -> Option<KnownHostsEntry> {
        read_seen_host_key(&self.known_hosts)
    }

    /// Stops the agent and deletes every temp file.
    pub async fn close(self, runner: &impl CommandRunner) {
        let Self {
            agent,
            key_file,
            known_hosts,
            ..
        } = self;
        if let Some(handle) = agent {
            handle.stop(runner).await;
        }
        for path in key_file.into_iter().chain(std::iter::once(known_hosts)) {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                tracing::warn!("cannot remove {shown}: {e}");
            }
        }
    }

    /// Releases the resources to the caller, who must call
    /// [`PersistentSshMaterial::cleanup`] once the tunnel is done.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SshSetupFailed`] if a temp file cannot be kept.
    pub fn into_persistent(self) -> Result<PersistentSshMaterial, ClientError> {
        let policy = self.policy;
        let options = self.options();
        let env = self.env();
        let Self {
            agent,
            key_file,
            known_hosts,
            ..
        } = self;
        let agent = agent.map(|h| {
            let program = h.program().to_string();
            (h.disarm(), program)
        });
        let keep = |p: TempPath| {
            p.keep()
                .map_err(|e| ClientError::SshSetupFailed(format!("keeping temp file: {e}")))
        };
        Ok(PersistentSshMaterial {
            policy,
            options,
            env,
            key_file: key_file.map(keep).transpose()?,
            known_hosts: keep(known_hosts)?,
            agent,
        })
    }
}

/// SSH material whose lifetime the caller manages.
#[derive(Debug)]
pub struct PersistentSshMaterial {
    pub policy: HostKeyPolicy,
    pub options: Vec<String>,
    pub env: Vec<(String, String)>,
    pub key_file: Option<PathBuf>,
    pub known_hosts: PathBuf,
    agent: Option<(AgentEnv, String)>,
}

impl PersistentSshMaterial {
    #[must_use]
    pub fn seen_host_key(&self) -> Option<KnownHostsEntry> {
        read_seen_host_key(&self.known_hosts)
    }

    /// Kills the agent and removes the files. Errors are logged.
    pub fn cleanup(self) {
        if let Some((env, program)) = &self.agent {
            agent::kill_agent_blocking(program, env.pid);
        }
        for path in self.key_file.iter().chain(std::iter::once(&self.known_hosts)) {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!("cannot remove {}: {e}", path.display());
            }
        }
    }
}

fn read_seen_host_key(path: &Path) -> Option<KnownHostsEntry> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .find_map(|l| KnownHostsEntry::parse(l).ok())
}
