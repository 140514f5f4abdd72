//! Tracker lifecycle: owns at most one running tracker process.
//!
//! The handle has exactly four writers: [`TrackerService::start`],
//! [`TrackerService::stop`], [`TrackerService::cleanup`] and the exit watcher
//! spawned by `start`. The watcher only clears the handle it was created for,
//! so an exit that arrives after `stop` (or after a restart) changes nothing.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::oneshot,
    task::JoinHandle,
};

use crate::{
    config::Config,
    constants::messages,
    output::LogService,
    process::{script::START_ARG, OutputStream, Spawner, TrackerProcess},
    python::DependencyCheck,
    ui::Window,
};

struct TrackerHandle {
    generation: u64,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<()>,
}

impl TrackerHandle {
    /// Signals the exit watcher and returns its task.
    fn terminate(mut self) -> JoinHandle<()> {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        self.watcher
    }
}

type SharedHandle = Arc<Mutex<Option<TrackerHandle>>>;

pub struct TrackerService {
    handle: SharedHandle,
    generation: AtomicU64,
    config: Arc<Config>,
    script: PathBuf,
    dependency: Arc<dyn DependencyCheck>,
    spawner: Arc<dyn Spawner>,
    window: Arc<dyn Window>,
    log: LogService,
}

impl TrackerService {
    pub fn new(
        config: Arc<Config>,
        script: PathBuf,
        dependency: Arc<dyn DependencyCheck>,
        spawner: Arc<dyn Spawner>,
        window: Arc<dyn Window>,
        log: LogService,
    ) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            config,
            script,
            dependency,
            spawner,
            window,
            log,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<TrackerHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().as_ref().and_then(|h| h.pid)
    }

    pub fn script_path(&self) -> &PathBuf {
        &self.script
    }

    /// Starts the tracker once `codecarbon` is available. False when already
    /// running, when the dependency is refused, or when the spawn fails.
    pub async fn start(&self) -> bool {
        if self.is_running() {
            self.window.show_information(messages::ALREADY_RUNNING);
            return false;
        }

        let python_path = self.config.python_path();
        if !self.dependency.ensure_codecarbon_installed(&python_path).await {
            return false;
        }

        let args = vec![self.script.to_string_lossy().into_owned(), START_ARG.to_string()];
        let mut guard = self.lock();
        if guard.is_some() {
            drop(guard);
            self.window.show_information(messages::ALREADY_RUNNING);
            return false;
        }
        let spawned = match self.spawner.spawn(&python_path, &args) {
            Ok(spawned) => spawned,
            Err(e) => {
                drop(guard);
                let msg = format!("Failed to start tracker with {}: {}", python_path, e);
                self.log.log_error(&msg);
                self.window.show_error(&msg);
                return false;
            }
        };

        // The watcher blocks on this lock until the handle below is stored.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (kill_tx, kill_rx) = oneshot::channel();
        let pid = spawned.process.id();
        let watcher = self.watch_exit(generation, spawned.process, kill_rx);
        *guard = Some(TrackerHandle {
            generation,
            pid,
            kill: Some(kill_tx),
            watcher,
        });
        drop(guard);

        if let Some(stderr) = spawned.stderr {
            self.forward_stderr(stderr);
        }
        if let Some(stdout) = spawned.stdout {
            self.forward_stdout(stdout);
        }

        tracing::info!(?pid, python = %python_path, "tracker started");
        self.log.log(messages::TRACKER_STARTED);
        true
    }

    pub fn stop(&self) -> bool {
        let Some(handle) = self.lock().take() else {
            self.window.show_information(messages::NOT_RUNNING);
            return false;
        };
        let _ = handle.terminate();

        self.log.log(messages::TRACKER_STOPPED);
        self.window.show_information(messages::TRACKER_STOPPED);
        true
    }

    /// Silent, idempotent stop for shutdown.
    pub fn cleanup(&self) {
        if let Some(handle) = self.lock().take() {
            tracing::debug!(pid = ?handle.pid, "cleaning up tracker");
            let _ = handle.terminate();
        }
    }

    /// Like [`Self::cleanup`], then waits until the child has exited.
    pub async fn shutdown(&self) {
        let handle = self.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.terminate().await {
                tracing::warn!(error = %e, "tracker watcher failed");
            }
        }
    }

    fn forward_stderr(&self, stream: OutputStream) {
        let log = self.log.clone();
        tokio::spawn(forward_lines(stream, move |line| {
            log.log_error(&format!("Python error: {}", line));
        }));
    }

    fn forward_stdout(&self, stream: OutputStream) {
        let log = self.log.clone();
        tokio::spawn(forward_lines(stream, move |line| {
            log.log(&format!("Python output: {}", line));
            log.parse_logs(line);
        }));
    }

    fn watch_exit(
        &self,
        generation: u64,
        mut process: Box<dyn TrackerProcess>,
        kill_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let handle = Arc::clone(&self.handle);
        let log = self.log.clone();
        tokio::spawn(async move {
            let exited = tokio::select! {
                res = process.wait() => Some(res),
                _ = kill_rx => None,
            };
            let res = match exited {
                Some(res) => res,
                None => {
                    if let Err(e) = process.terminate() {
                        tracing::warn!(error = %e, "failed to signal tracker");
                    }
                    process.wait().await
                }
            };

            let code = match res {
                Ok(Some(code)) => code.to_string(),
                Ok(None) => "null".to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to wait for tracker");
                    "null".to_string()
                }
            };
            log.log(&format!("Tracker process exited with code {}", code));

            let mut guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.as_ref().map(|h| h.generation) == Some(generation) {
                *guard = None;
            }
        })
    }
}

/// Drains `stream` to EOF, handing over each line lossily decoded. A final
/// line without a newline is still delivered.
async fn forward_lines(stream: OutputStream, mut on_line: impl FnMut(&str)) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                on_line(text.trim_end_matches(|c: char| c == '\n' || c == '\r'));
            }
            Err(e) => {
                tracing::warn!(error = %e, "tracker output read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::INTERPRETER,
        output::{Level, MemorySink},
        testing::{FakeSpawner, FakeWindow, FixedDependency, Notice},
    };
    use std::time::Duration;

    struct Harness {
        tracker: TrackerService,
        dependency: Arc<FixedDependency>,
        spawner: Arc<FakeSpawner>,
        window: Arc<FakeWindow>,
        sink: Arc<MemorySink>,
    }

    fn harness(installed: bool) -> Harness {
        let dependency = Arc::new(FixedDependency::new(installed));
        let spawner = Arc::new(FakeSpawner::new());
        let window = Arc::new(FakeWindow::default());
        let sink = Arc::new(MemorySink::default());
        let config = Arc::new(Config::from_pairs([(INTERPRETER, "/usr/bin/python3.11")]));
        let tracker = TrackerService::new(
            config,
            PathBuf::from("/opt/cc/tracker.py"),
            dependency.clone(),
            spawner.clone(),
            window.clone(),
            LogService::new().with_sink(sink.clone()),
        );
        Harness {
            tracker,
            dependency,
            spawner,
            window,
            sink,
        }
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn start_spawns_script_with_start_argument() {
        let h = harness(true);
        assert!(h.tracker.start().await);
        assert!(h.tracker.is_running());
        assert_eq!(h.tracker.pid(), Some(4000));

        let child = h.spawner.last().unwrap();
        assert_eq!(child.program, "/usr/bin/python3.11");
        assert_eq!(child.args, vec!["/opt/cc/tracker.py".to_string(), "start".to_string()]);
        assert!(h.sink.contains(messages::TRACKER_STARTED));
    }

    #[tokio::test]
    async fn start_twice_keeps_first_handle() {
        let h = harness(true);
        assert!(h.tracker.start().await);
        assert!(!h.tracker.start().await);
        assert_eq!(h.spawner.children().len(), 1);
        assert_eq!(h.tracker.pid(), Some(4000));
        assert!(h
            .window
            .notices()
            .contains(&Notice::Info(messages::ALREADY_RUNNING.to_string())));
        assert_eq!(h.dependency.checks(), 1);
    }

    #[tokio::test]
    async fn start_without_dependency_spawns_nothing() {
        let h = harness(false);
        assert!(!h.tracker.start().await);
        assert!(!h.tracker.is_running());
        assert!(h.spawner.children().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_stays_idle() {
        let h = harness(true);
        h.spawner.fail_next(true);
        assert!(!h.tracker.start().await);
        assert!(!h.tracker.is_running());
        assert!(matches!(h.window.notices().last(), Some(Notice::Error(_))));

        h.spawner.fail_next(false);
        assert!(h.tracker.start().await);
    }

    #[tokio::test]
    async fn stop_terminates_and_clears() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        assert!(h.tracker.stop());
        assert!(!h.tracker.is_running());
        assert!(eventually(|| child.terminations() == 1).await);
        assert!(h
            .window
            .notices()
            .contains(&Notice::Info(messages::TRACKER_STOPPED.to_string())));
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_no_op() {
        let h = harness(true);
        assert!(!h.tracker.stop());
        assert_eq!(
            h.window.notices(),
            vec![Notice::Info(messages::NOT_RUNNING.to_string())]
        );
        assert!(h.spawner.children().is_empty());
    }

    #[tokio::test]
    async fn exit_after_stop_is_harmless() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();
        h.tracker.stop();

        child.exit(Some(0));
        assert!(eventually(|| h.sink.contains("Tracker process exited with code")).await);
        assert!(!h.tracker.is_running());
    }

    #[tokio::test]
    async fn late_exit_does_not_clear_a_restarted_tracker() {
        let h = harness(true);
        h.tracker.start().await;
        h.tracker.stop();
        assert!(h.tracker.start().await);

        assert!(eventually(|| h.sink.contains("Tracker process exited with code null")).await);
        assert!(h.tracker.is_running());
        assert_eq!(h.tracker.pid(), Some(4001));
    }

    #[tokio::test]
    async fn unsolicited_exit_returns_to_idle() {
        let h = harness(true);
        h.tracker.start().await;
        h.spawner.last().unwrap().exit(Some(1));

        assert!(eventually(|| !h.tracker.is_running()).await);
        assert!(h.sink.contains("Tracker process exited with code 1"));
        assert!(!h.tracker.stop());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        h.tracker.cleanup();
        h.tracker.cleanup();
        assert!(!h.tracker.is_running());
        assert!(eventually(|| child.terminations() == 1).await);
        assert!(h.window.notices().is_empty());
    }

    #[tokio::test]
    async fn shutdown_waits_for_exit() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        h.tracker.shutdown().await;
        assert_eq!(child.terminations(), 1);
        assert!(h.sink.contains("Tracker process exited with code null"));
        h.tracker.shutdown().await;
        assert!(!h.tracker.is_running());
    }

    #[tokio::test]
    async fn output_is_forwarded_to_the_log() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        child.write_stdout("Total emissions: 0.42\n").await.unwrap();
        child.write_stderr("codecarbon WARNING: no GPU\n").await.unwrap();

        assert!(eventually(|| h.sink.contains("Emissions update: Total emissions: 0.42")).await);
        assert!(h.sink.contains("Python output: Total emissions: 0.42"));
        assert!(eventually(|| h.sink.contains("Python error: codecarbon WARNING: no GPU")).await);
        let stderr_level = h
            .sink
            .entries()
            .into_iter()
            .find(|(_, l)| l.starts_with("Python error"))
            .map(|(level, _)| level);
        assert_eq!(stderr_level, Some(Level::Error));
        assert!(h.tracker.is_running());
    }

    #[tokio::test]
    async fn invalid_utf8_output_keeps_the_stream_alive() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        child.write_stdout(b"bad \xff byte\n").await.unwrap();
        child.write_stdout("Total emissions: 0.5\n").await.unwrap();
        child.write_stderr(b"warn \xfe\n").await.unwrap();

        assert!(eventually(|| h.sink.contains("Emissions update: Total emissions: 0.5")).await);
        assert!(h.sink.contains("Python output: bad \u{FFFD} byte"));
        assert!(eventually(|| h.sink.contains("Python error: warn \u{FFFD}")).await);
        assert!(h.tracker.is_running());
    }

    #[tokio::test]
    async fn partial_last_line_is_forwarded() {
        let h = harness(true);
        h.tracker.start().await;
        let child = h.spawner.last().unwrap();

        child.write_stdout("Total emissions: 1.25").await.unwrap();
        child.write_stderr("no newline").await.unwrap();
        child.close_output().await.unwrap();

        assert!(eventually(|| h.sink.contains("Python output: Total emissions: 1.25")).await);
        assert!(h.sink.contains("Emissions update: Total emissions: 1.25"));
        assert!(eventually(|| h.sink.contains("Python error: no newline")).await);
        assert!(h.tracker.is_running());
    }

    #[tokio::test]
    async fn running_flag_tracks_start_stop_sequences() {
        let h = harness(true);
        let mut expected = false;
        for op in [true, true, false, false, true, false, true] {
            if op {
                let started = h.tracker.start().await;
                assert_eq!(started, !expected);
                expected = true;
            } else {
                let stopped = h.tracker.stop();
                assert_eq!(stopped, expected);
                expected = false;
            }
            assert_eq!(h.tracker.is_running(), expected);
        }
    }
}
