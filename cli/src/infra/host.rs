//! `SystemHost`: every production port behind one value, rooted at a
//! project directory.

use std::path::{Path, PathBuf};

use anyhow::Result;
use silo_common::Lockfile;

use crate::application::ports::{
    CommandOutput, CommandRequest, CommandRunner, LocalFs as FsPort, LocalPaths, LockfileStore,
    PortProbe, ProcessControl, StopSignal,
};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::fs::LocalFs;
use crate::infra::lockfile::LockfileManager;
use crate::infra::network::TcpPortProbe;
use crate::infra::process::UnixProcessControl;

/// Production ports for one project root.
#[derive(Debug, Clone)]
pub struct SystemHost {
    runner: TokioCommandRunner,
    probe: TcpPortProbe,
    lockfile: LockfileManager,
    fs: LocalFs,
    process: UnixProcessControl,
}

impl SystemHost {
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            runner: TokioCommandRunner::new(),
            probe: TcpPortProbe,
            lockfile: LockfileManager::new(project_root),
            fs: LocalFs,
            process: UnixProcessControl::new(),
        }
    }
}

impl CommandRunner for SystemHost {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.runner.run(request).await
    }

    fn spawn(&self, request: &CommandRequest) -> Result<tokio::process::Child> {
        self.runner.spawn(request)
    }
}

impl PortProbe for SystemHost {
    async fn is_free(&self, port: u16) -> bool {
        self.probe.is_free(port).await
    }
}

impl LockfileStore for SystemHost {
    async fn read(&self) -> Result<Option<Lockfile>> {
        self.lockfile.read().await
    }

    async fn write(&self, lockfile: &Lockfile) -> Result<()> {
        self.lockfile.write(lockfile).await
    }

    async fn remove(&self) -> Result<()> {
        self.lockfile.remove().await
    }

    fn path(&self) -> &Path {
        self.lockfile.path()
    }
}

impl FsPort for SystemHost {
    fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.fs.write(path, content)
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        self.fs.append(path, content)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.fs.remove_file(path)
    }

    fn scratch_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        self.fs.scratch_dir(prefix)
    }
}

impl LocalPaths for SystemHost {
    fn kube_dir(&self) -> Result<PathBuf> {
        self.fs.kube_dir()
    }
}

impl ProcessControl for SystemHost {
    fn is_alive(&self, pid: u32) -> bool {
        self.process.is_alive(pid)
    }

    async fn command_name(&self, pid: u32) -> Option<String> {
        self.process.command_name(pid).await
    }

    async fn find_pids(&self, pattern: &str) -> Vec<u32> {
        self.process.find_pids(pattern).await
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        self.process.signal(pid, signal)
    }

    async fn wait_forwarding_signals(
        &self,
        child: &mut tokio::process::Child,
    ) -> Result<Option<i32>> {
        self.process.wait_forwarding_signals(child).await
    }
}
