//! Shared mock infrastructure for unit tests.
//!
//! Every port has an in-memory implementation here, and [`MockHost`] bundles
//! them into one `InstanceHost` so lifecycle services can be driven without
//! touching k3d, tilt, docker or the network.

#![allow(clippy::expect_used, dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use silo_cli::application::ports::{
    CommandOutput, CommandRequest, CommandRunner, LocalFs, LocalPaths, LockfileStore,
    PortProbe, ProcessControl, ProgressReporter, StopSignal,
};
use silo_cli::domain::error::{CommandError, LockfileError};
use silo_common::Lockfile;

// ── Command runner ────────────────────────────────────────────────────────────

/// Canned answer for one command invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(CommandOutput),
    Timeout,
    SpawnError(String),
}

pub fn ok(stdout: &str) -> Reply {
    Reply::Output(CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn fail(code: i32, stderr: &str) -> Reply {
    Reply::Output(CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// Render a request the way a shell user would type it.
pub fn command_line(request: &CommandRequest) -> String {
    std::iter::once(request.program.as_str())
        .chain(request.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Answers commands by the longest matching command-line prefix.
///
/// Each prefix holds a queue of replies; the last reply repeats. Commands
/// with no matching prefix succeed with empty output, so tool checks pass
/// by default.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<(String, VecDeque<Reply>)>>,
    calls: RefCell<Vec<CommandRequest>>,
    /// Exit code of children started with `spawn`.
    spawn_exit: i32,
    /// Shell script run by spawned children instead of a plain exit.
    spawn_script: Option<String>,
    spawned: RefCell<Vec<u32>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children started with `spawn` exit with `code`.
    #[must_use]
    pub fn with_spawn_exit(mut self, code: i32) -> Self {
        self.spawn_exit = code;
        self
    }

    /// Children started with `spawn` run `script` under `/bin/sh -c`.
    #[must_use]
    pub fn with_spawn_script(mut self, script: &str) -> Self {
        self.spawn_script = Some(script.to_string());
        self
    }

    /// Pids of every child started with `spawn`.
    pub fn spawned(&self) -> Vec<u32> {
        self.spawned.borrow().clone()
    }

    /// Queue `reply` for commands starting with `prefix`.
    #[must_use]
    pub fn on(self, prefix: &str, reply: Reply) -> Self {
        self.push(prefix, reply);
        self
    }

    pub fn push(&self, prefix: &str, reply: Reply) {
        let mut rules = self.rules.borrow_mut();
        match rules.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(reply),
            None => rules.push((prefix.to_string(), VecDeque::from([reply]))),
        }
    }

    fn reply_for(&self, line: &str) -> Reply {
        let mut rules = self.rules.borrow_mut();
        let best = rules
            .iter_mut()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match best {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().expect("non-empty queue"),
            Some((_, queue)) => queue.front().cloned().expect("non-empty queue"),
            None => ok(""),
        }
    }

    /// Every command run so far, as command lines.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(command_line).collect()
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.calls.borrow().clone()
    }

    /// How many calls started with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Index of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(request.clone());
        match self.reply_for(&command_line(request)) {
            Reply::Output(output) => Ok(output),
            Reply::Timeout => Err(CommandError::Timeout {
                context: request.context.clone(),
                after: request.timeout.unwrap_or(Duration::from_secs(1)),
            }
            .into()),
            Reply::SpawnError(message) => anyhow::bail!(message),
        }
    }

    fn spawn(&self, request: &CommandRequest) -> Result<tokio::process::Child> {
        self.calls.borrow_mut().push(request.clone());
        let script = self
            .spawn_script
            .clone()
            .unwrap_or_else(|| format!("exit {}", self.spawn_exit));
        let child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .spawn()?;
        if let Some(pid) = child.id() {
            self.spawned.borrow_mut().push(pid);
        }
        Ok(child)
    }
}

// ── Lockfile store ────────────────────────────────────────────────────────────

/// Lockfile held in memory.
pub struct MemoryLockfile {
    pub current: RefCell<Option<Lockfile>>,
    pub writes: RefCell<usize>,
    path: PathBuf,
}

impl MemoryLockfile {
    pub fn new(initial: Option<Lockfile>) -> Self {
        Self {
            current: RefCell::new(initial),
            writes: RefCell::new(0),
            path: PathBuf::from("/project/.silo.lock"),
        }
    }

    pub fn instance(&self) -> Option<silo_common::InstanceState> {
        self.current.borrow().as_ref().map(|l| l.instance.clone())
    }
}

impl LockfileStore for MemoryLockfile {
    async fn read(&self) -> Result<Option<Lockfile>> {
        Ok(self.current.borrow().clone())
    }

    async fn write(&self, lockfile: &Lockfile) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        *self.current.borrow_mut() = Some(lockfile.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.current.borrow_mut() = None;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// A lockfile whose contents cannot be parsed.
pub struct CorruptLockfile;

impl LockfileStore for CorruptLockfile {
    async fn read(&self) -> Result<Option<Lockfile>> {
        Err(LockfileError::Invalid {
            path: PathBuf::from("/project/.silo.lock"),
            reason: "expected value at line 1 column 1".into(),
        }
        .into())
    }
    async fn write(&self, _: &Lockfile) -> Result<()> {
        anyhow::bail!("write not expected in this test")
    }
    async fn remove(&self) -> Result<()> {
        anyhow::bail!("remove not expected in this test")
    }
    fn path(&self) -> &Path {
        Path::new("/project/.silo.lock")
    }
}

// ── Filesystem ────────────────────────────────────────────────────────────────

/// Files held in memory. Scratch directories are real temp dirs.
#[derive(Default)]
pub struct MemoryFs {
    pub files: RefCell<BTreeMap<PathBuf, String>>,
    pub kube_dir: PathBuf,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            files: RefCell::new(BTreeMap::new()),
            kube_dir: PathBuf::from("/home/dev/.kube"),
        }
    }

    pub fn read(&self, path: &Path) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }
}

impl LocalFs for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        self.files
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_default()
            .push_str(content);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.files.borrow_mut().remove(path);
        Ok(())
    }

    fn scratch_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        Ok(tempfile::Builder::new().prefix(prefix).tempdir()?)
    }
}

impl LocalPaths for MemoryFs {
    fn kube_dir(&self) -> Result<PathBuf> {
        Ok(self.kube_dir.clone())
    }
}

// ── Port probe ────────────────────────────────────────────────────────────────

/// Every port is free except the ones marked busy.
#[derive(Default)]
pub struct FakeProbe {
    pub busy: RefCell<HashSet<u16>>,
    pub probed: RefCell<Vec<u16>>,
}

impl FakeProbe {
    pub fn with_busy(ports: &[u16]) -> Self {
        Self {
            busy: RefCell::new(ports.iter().copied().collect()),
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl PortProbe for FakeProbe {
    async fn is_free(&self, port: u16) -> bool {
        self.probed.borrow_mut().push(port);
        !self.busy.borrow().contains(&port)
    }
}

// ── Process control ───────────────────────────────────────────────────────────

/// Simulated process table.
#[derive(Default)]
pub struct FakeProcesses {
    pub alive: RefCell<HashSet<u32>>,
    pub names: HashMap<u32, String>,
    /// Result of every `pgrep`.
    pub matching: Vec<u32>,
    /// Pids that exit when interrupted.
    pub exit_on_interrupt: HashSet<u32>,
    pub signals: RefCell<Vec<(u32, StopSignal)>>,
}

impl FakeProcesses {
    /// One live process named `name`.
    pub fn running(pid: u32, name: &str) -> Self {
        Self {
            alive: RefCell::new(HashSet::from([pid])),
            names: HashMap::from([(pid, name.to_string())]),
            ..Self::default()
        }
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.signals.borrow().clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.borrow().contains(&pid)
    }

    async fn command_name(&self, pid: u32) -> Option<String> {
        self.names.get(&pid).cloned()
    }

    async fn find_pids(&self, _pattern: &str) -> Vec<u32> {
        self.matching.clone()
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        self.signals.borrow_mut().push((pid, signal));
        if signal == StopSignal::Terminate
            || (signal == StopSignal::Interrupt && self.exit_on_interrupt.contains(&pid))
        {
            self.alive.borrow_mut().remove(&pid);
        }
        Ok(())
    }

    async fn wait_forwarding_signals(
        &self,
        child: &mut tokio::process::Child,
    ) -> Result<Option<i32>> {
        Ok(child.wait().await?.code())
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Step,
    Success,
    Warn,
    Detail,
}

/// Records every progress event.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<(Level, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn saw(&self, level: Level, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.borrow_mut().push((Level::Step, message.to_string()));
    }
    fn success(&self, message: &str) {
        self.events.borrow_mut().push((Level::Success, message.to_string()));
    }
    fn warn(&self, message: &str) {
        self.events.borrow_mut().push((Level::Warn, message.to_string()));
    }
    fn detail(&self, message: &str) {
        self.events.borrow_mut().push((Level::Detail, message.to_string()));
    }
}

// ── Combined host ─────────────────────────────────────────────────────────────

/// All mocks behind one `InstanceHost`.
pub struct MockHost {
    pub runner: ScriptedRunner,
    pub probe: FakeProbe,
    pub lockfile: MemoryLockfile,
    pub fs: MemoryFs,
    pub processes: FakeProcesses,
}

impl MockHost {
    pub fn new(runner: ScriptedRunner, lockfile: Option<Lockfile>) -> Self {
        Self {
            runner,
            probe: FakeProbe::default(),
            lockfile: MemoryLockfile::new(lockfile),
            fs: MemoryFs::new(),
            processes: FakeProcesses::default(),
        }
    }
}

impl CommandRunner for MockHost {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.runner.run(request).await
    }
    fn spawn(&self, request: &CommandRequest) -> Result<tokio::process::Child> {
        self.runner.spawn(request)
    }
}

impl PortProbe for MockHost {
    async fn is_free(&self, port: u16) -> bool {
        self.probe.is_free(port).await
    }
}

impl LockfileStore for MockHost {
    async fn read(&self) -> Result<Option<Lockfile>> {
        self.lockfile.read().await
    }
    async fn write(&self, lockfile: &Lockfile) -> Result<()> {
        LockfileStore::write(&self.lockfile, lockfile).await
    }
    async fn remove(&self) -> Result<()> {
        self.lockfile.remove().await
    }
    fn path(&self) -> &Path {
        self.lockfile.path()
    }
}

impl LocalFs for MockHost {
    fn exists(&self, path: &Path) -> bool {
        self.fs.exists(path)
    }
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        LocalFs::write(&self.fs, path, content)
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

impl LocalPaths for MockHost {
    fn kube_dir(&self) -> Result<PathBuf> {
        self.fs.kube_dir()
    }
}

impl ProcessControl for MockHost {
    fn is_alive(&self, pid: u32) -> bool {
        self.processes.is_alive(pid)
    }
    async fn command_name(&self, pid: u32) -> Option<String> {
        self.processes.command_name(pid).await
    }
    async fn find_pids(&self, pattern: &str) -> Vec<u32> {
        self.processes.find_pids(pattern).await
    }
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        self.processes.signal(pid, signal)
    }
    async fn wait_forwarding_signals(
        &self,
        child: &mut tokio::process::Child,
    ) -> Result<Option<i32>> {
        self.processes.wait_forwarding_signals(child).await
    }
}
