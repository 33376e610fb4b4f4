//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` runs captured commands under a timeout and kills the
//! child explicitly when it fires.

use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::Child;

use crate::application::ports::CommandRunner;

/// Timeout for helper tools (`ssh-agent`, `ssh-add`, `ssh-keyscan`).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(program: &str, args: &[&str], env: &[(&str, &str)]) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .envs(env.iter().copied())
            .kill_on_drop(true);
        cmd
    }

    async fn collect(&self, program: &str, mut child: Child) -> Result<Output> {
        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", self.timeout.as_secs())
            }
        }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
        let child = Self::command(program, args, env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        self.collect(program, child).await
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        stdin: &[u8],
    ) -> Result<Output> {
        let mut child = Self::command(program, args, env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdin_handle = child.stdin.take();
        let input = stdin.to_vec();
        let writer = tokio::spawn(async move {
            if let Some(mut pipe) = stdin_handle {
                use tokio::io::AsyncWriteExt;
                let _ = pipe.write_all(&input).await;
            }
        });

        let output = self.collect(program, child).await;
        let _ = writer.await;
        output
    }

    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExitStatus> {
        // Interactive sessions: inherited stdio, no timeout.
        let mut child = Self::command(program, args, env)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}
