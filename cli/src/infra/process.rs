//! Process infrastructure: implements `ProcessControl` with `nix` signals,
//! `ps`/`pgrep` lookups and tokio signal streams.

use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};

use crate::application::ports::{CommandRequest, CommandRunner, ProcessControl, StopSignal};
use crate::infra::command_runner::TokioCommandRunner;

/// Upper bound for one `ps`/`pgrep` lookup.
const PROCESS_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Production `ProcessControl` for Unix hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcessControl {
    runner: TokioCommandRunner,
}

impl UnixProcessControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn query(&self, program: &str, args: &[&str]) -> Option<String> {
        let request = CommandRequest::new(program, args.iter().copied()).timeout(PROCESS_CHECK_TIMEOUT);
        match self.runner.run(&request).await {
            Ok(output) if output.success() => Some(output.stdout),
            _ => None,
        }
    }
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

fn to_signal(signal: StopSignal) -> Signal {
    match signal {
        StopSignal::Interrupt => Signal::SIGINT,
        StopSignal::Terminate => Signal::SIGTERM,
    }
}

/// Parse `pgrep` output into pids.
fn parse_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

impl ProcessControl for UnixProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        // Signal 0 only checks that the pid exists and may be signalled.
        to_pid(pid).is_some_and(|pid| kill(pid, None).is_ok())
    }

    async fn command_name(&self, pid: u32) -> Option<String> {
        let pid = pid.to_string();
        self.query("ps", &["-p", &pid, "-o", "comm="])
            .await
            .map(|out| out.trim().to_string())
            .filter(|name| !name.is_empty())
    }

    async fn find_pids(&self, pattern: &str) -> Vec<u32> {
        self.query("pgrep", &["-f", pattern])
            .await
            .map(|out| parse_pids(&out))
            .unwrap_or_default()
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        let Some(target) = to_pid(pid) else {
            return Ok(());
        };
        match kill(target, to_signal(signal)) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("signalling pid {pid}")),
        }
    }

    async fn wait_forwarding_signals(
        &self,
        child: &mut tokio::process::Child,
    ) -> Result<Option<i32>> {
        let mut interrupts = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
        let mut terminates =
            signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let pid = child.id();

        loop {
            tokio::select! {
                status = child.wait() => {
                    return Ok(status.context("waiting for dev loop")?.code());
                }
                _ = interrupts.recv() => {
                    if let Some(pid) = pid {
                        self.signal(pid, StopSignal::Interrupt)?;
                    }
                }
                _ = terminates.recv() => {
                    if let Some(pid) = pid {
                        self.signal(pid, StopSignal::Terminate)?;
                    }
                }
            }
        }
    }
}
