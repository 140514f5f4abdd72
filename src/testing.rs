//! In-memory doubles for the host surfaces, pip and the tracker child.
//!
//! Compiled for the crate's own tests, or with the `testing` feature for
//! integration tests and embedders that want to drive
//! [`crate::extension::Extension`] without a terminal or a Python install.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncWriteExt, DuplexStream},
    sync::watch,
};

use crate::{
    process::{
        command::{CommandError, CommandOutput, CommandRunner},
        OutputStream, SpawnedProcess, Spawner, TrackerProcess,
    },
    python::DependencyCheck,
    ui::{InstallChoice, Window},
};

const DEFAULT_SHOW_OUTPUT: &str = "Name: codecarbon\nVersion: 3.1.0\nLocation: /site-packages\n";

/// Scripted pip: `show` succeeds only once the package counts as installed.
#[derive(Debug, Default)]
pub struct FakeRunner {
    installed: AtomicBool,
    show_output: String,
    install_failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn installed(show_output: &str) -> Self {
        Self {
            installed: AtomicBool::new(true),
            show_output: show_output.to_string(),
            ..Self::default()
        }
    }

    pub fn missing() -> Self {
        Self {
            show_output: DEFAULT_SHOW_OUTPUT.to_string(),
            ..Self::default()
        }
    }

    pub fn failing_install(mut self, stderr: &str) -> Self {
        self.install_failure = Some(stderr.to_string());
        self
    }

    /// Every invocation as `program arg arg ...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Package specs passed to `pip install`.
    pub fn installs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.split_once(" -m pip install ").map(|(_, spec)| spec.to_string()))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let mut line = program.to_string();
        for a in args {
            line.push(' ');
            line.push_str(a);
        }
        if let Ok(mut c) = self.calls.lock() {
            c.push(line);
        }

        let failed = |stderr: &str| CommandError::Failed {
            program: program.to_string(),
            code: Some(1),
            stderr: stderr.to_string(),
        };
        match args.get(2).copied() {
            Some("show") if self.installed.load(Ordering::SeqCst) => Ok(CommandOutput {
                stdout: self.show_output.clone(),
                stderr: String::new(),
            }),
            Some("show") => Err(failed("WARNING: Package(s) not found: codecarbon")),
            Some("install") => match &self.install_failure {
                Some(stderr) => Err(failed(stderr)),
                None => {
                    self.installed.store(true, Ordering::SeqCst);
                    Ok(CommandOutput::default())
                }
            },
            _ => Err(failed("unsupported")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

/// Records notifications and answers prompts with canned values.
#[derive(Debug, Default)]
pub struct FakeWindow {
    choice: Option<InstallChoice>,
    input: Option<String>,
    notices: Mutex<Vec<Notice>>,
    prompts: AtomicUsize,
}

impl FakeWindow {
    pub fn choosing(choice: Option<InstallChoice>) -> Self {
        Self {
            choice,
            ..Self::default()
        }
    }

    pub fn with_input(mut self, input: Option<&str>) -> Self {
        self.input = input.map(str::to_string);
        self
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// How many times the install prompt was shown.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    fn push(&self, notice: Notice) {
        if let Ok(mut n) = self.notices.lock() {
            n.push(notice);
        }
    }
}

#[async_trait]
impl Window for FakeWindow {
    fn show_information(&self, message: &str) {
        self.push(Notice::Info(message.to_string()));
    }

    fn show_warning(&self, message: &str) {
        self.push(Notice::Warning(message.to_string()));
    }

    fn show_error(&self, message: &str) {
        self.push(Notice::Error(message.to_string()));
    }

    async fn pick_install_option(&self, _message: &str) -> Option<InstallChoice> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.choice
    }

    async fn input_box(&self, _prompt: &str, _placeholder: &str) -> Option<String> {
        self.input.clone()
    }
}

/// Dependency check with a fixed answer.
#[derive(Debug)]
pub struct FixedDependency {
    installed: bool,
    checks: AtomicUsize,
}

impl FixedDependency {
    pub fn new(installed: bool) -> Self {
        Self {
            installed,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyCheck for FixedDependency {
    async fn ensure_codecarbon_installed(&self, _python_path: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.installed
    }
}

type ExitSlot = watch::Sender<Option<Option<i32>>>;

/// Test-side view of one fake child.
pub struct FakeChild {
    pub pid: u32,
    pub program: String,
    pub args: Vec<String>,
    exit: Arc<ExitSlot>,
    terminations: Arc<AtomicUsize>,
    stdout: tokio::sync::Mutex<DuplexStream>,
    stderr: tokio::sync::Mutex<DuplexStream>,
}

impl FakeChild {
    /// Makes the child exit on its own.
    pub fn exit(&self, code: Option<i32>) {
        self.exit.send_replace(Some(code));
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub async fn write_stdout(&self, data: impl AsRef<[u8]>) -> io::Result<()> {
        self.stdout.lock().await.write_all(data.as_ref()).await
    }

    pub async fn write_stderr(&self, data: impl AsRef<[u8]>) -> io::Result<()> {
        self.stderr.lock().await.write_all(data.as_ref()).await
    }

    /// Closes both pipes, as a child does when it closes its stdio.
    pub async fn close_output(&self) -> io::Result<()> {
        self.stdout.lock().await.shutdown().await?;
        self.stderr.lock().await.shutdown().await
    }
}

struct FakeProcess {
    pid: u32,
    exit: Arc<ExitSlot>,
    terminations: Arc<AtomicUsize>,
}

#[async_trait]
impl TrackerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.exit.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(None);
                true
            } else {
                false
            }
        });
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let mut rx = self.exit.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if let Some(code) = current {
                return Ok(code);
            }
            rx.changed()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        }
    }
}

/// Hands out [`FakeChild`]ren; can be told to fail like a missing interpreter.
#[derive(Default)]
pub struct FakeSpawner {
    next_pid: AtomicU32,
    fail: AtomicBool,
    children: Mutex<Vec<Arc<FakeChild>>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(4000),
            ..Self::default()
        }
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn children(&self) -> Vec<Arc<FakeChild>> {
        self.children.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Arc<FakeChild>> {
        self.children().pop()
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<SpawnedProcess> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", program),
            ));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (exit, _) = watch::channel(None);
        let exit = Arc::new(exit);
        let terminations = Arc::new(AtomicUsize::new(0));
        let (stdout_writer, stdout_reader) = tokio::io::duplex(4096);
        let (stderr_writer, stderr_reader) = tokio::io::duplex(4096);

        let child = Arc::new(FakeChild {
            pid,
            program: program.to_string(),
            args: args.to_vec(),
            exit: exit.clone(),
            terminations: terminations.clone(),
            stdout: tokio::sync::Mutex::new(stdout_writer),
            stderr: tokio::sync::Mutex::new(stderr_writer),
        });
        if let Ok(mut c) = self.children.lock() {
            c.push(child);
        }

        Ok(SpawnedProcess {
            process: Box::new(FakeProcess {
                pid,
                exit,
                terminations,
            }),
            stdout: Some(Box::new(stdout_reader) as OutputStream),
            stderr: Some(Box::new(stderr_reader) as OutputStream),
        })
    }
}
