//! Ephemeral `ssh-agent` holding a single key.

use anyhow::{Context, Result};

use crate::application::ports::CommandRunner;
use crate::domain::ssh::{AgentEnv, parse_agent_output};

/// A running agent started by [`start`]. Killed on drop unless stopped or
/// disarmed first.
#[derive(Debug)]
pub struct AgentHandle {
    env: AgentEnv,
    program: String,
    alive: bool,
}

impl AgentHandle {
    #[must_use]
    pub fn env(&self) -> &AgentEnv {
        &self.env
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// `SSH_AUTH_SOCK` and `SSH_AGENT_PID` for child processes.
    #[must_use]
    pub fn vars(&self) -> Vec<(String, String)> {
        vec![
            ("SSH_AUTH_SOCK".to_string(), self.env.auth_sock.clone()),
            ("SSH_AGENT_PID".to_string(), self.env.pid.to_string()),
        ]
    }

    /// Kills the agent with `ssh-agent -k`. On failure the drop guard still
    /// makes a last attempt.
    pub async fn stop(mut self, runner: &impl CommandRunner) {
        let pid = self.env.pid.to_string();
        match runner
            .run(&self.program, &["-k"], &[("SSH_AGENT_PID", pid.as_str())])
            .await
        {
            Ok(out) if out.status.success() => self.alive = false,
            Ok(out) => tracing::warn!(
                pid = self.env.pid,
                "ssh-agent -k failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => tracing::warn!(pid = self.env.pid, "ssh-agent -k failed: {e:#}"),
        }
    }

    /// Hands ownership of the agent process to the caller.
    #[must_use]
    pub fn disarm(mut self) -> AgentEnv {
        self.alive = false;
        self.env.clone()
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        if self.alive {
            kill_agent_blocking(&self.program, self.env.pid);
        }
    }
}

/// Synchronous `ssh-agent -k`, for drop paths. Errors are ignored.
pub fn kill_agent_blocking(program: &str, pid: u32) {
    let status = std::process::Command::new(program)
        .arg("-k")
        .env("SSH_AGENT_PID", pid.to_string())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::debug!(pid, "cannot kill ssh-agent: {e}");
    }
}

/// Starts `agent_program -s` and loads `key` through `add_program -`.
///
/// A started agent is stopped again before any error returns.
///
/// # Errors
///
/// Returns an error if the agent does not start, prints no socket/pid, or
/// rejects the key.
pub async fn start(
    runner: &impl CommandRunner,
    agent_program: &str,
    add_program: &str,
    key: &str,
) -> Result<AgentHandle> {
    let out = runner
        .run(agent_program, &["-s"], &[])
        .await
        .context("starting ssh-agent")?;
    anyhow::ensure!(
        out.status.success(),
        "ssh-agent exited with {}: {}",
        out.status,
        String::from_utf8_lossy(&out.stderr).trim()
    );
    let env = parse_agent_output(&String::from_utf8_lossy(&out.stdout))
        .context("ssh-agent printed no SSH_AUTH_SOCK/SSH_AGENT_PID")?;
    let handle = AgentHandle {
        env,
        program: agent_program.to_string(),
        alive: true,
    };

    let pid = handle.env.pid.to_string();
    let added = runner
        .run_with_stdin(
            add_program,
            &["-"],
            &[
                ("SSH_AUTH_SOCK", handle.env.auth_sock.as_str()),
                ("SSH_AGENT_PID", pid.as_str()),
            ],
            key.as_bytes(),
        )
        .await;
    match added {
        Ok(out) if out.status.success() => Ok(handle),
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            handle.stop(runner).await;
            anyhow::bail!("ssh-add rejected the key: {stderr}")
        }
        Err(e) => {
            handle.stop(runner).await;
            Err(e.context("running ssh-add"))
        }
    }
}
