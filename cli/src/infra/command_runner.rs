//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` runs argv commands with tokio and guarantees a
//! timed-out child is killed rather than left running.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::application::ports::{CommandOutput, CommandRequest, CommandRunner, StdioMode};
use crate::domain::error::CommandError;

/// Production `CommandRunner`.
///
/// `tokio::time::timeout` around `.output().await` only drops the future;
/// the OS process keeps running. This implementation races the child
/// against a sleep with `tokio::select!` and kills it explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn command(request: &CommandRequest) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&request.program);
    cmd.args(&request.args)
        .envs(request.env.iter())
        .kill_on_drop(true);
    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    match request.stdio {
        StdioMode::Capture => {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
        StdioMode::Inherit => {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
    }
    cmd
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let mut child = command(request)
            .spawn()
            .with_context(|| format!("failed to spawn {}", request.program))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let deadline = async {
            match request.timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

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
                let status = status.with_context(|| format!("waiting for {}", request.program))?;
                Ok(CommandOutput {
                    code: status.code(),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                })
            } => result,
            () = deadline => {
                let _ = child.kill().await;
                Err(CommandError::Timeout {
                    context: request.context.clone(),
                    after: request.timeout.unwrap_or_default(),
                }
                .into())
            }
        }
    }

    fn spawn(&self, request: &CommandRequest) -> Result<tokio::process::Child> {
        command(request)
            .spawn()
            .with_context(|| format!("failed to spawn {}", request.program))
    }
}
