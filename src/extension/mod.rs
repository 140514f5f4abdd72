//! Command layer: wires the services together and keeps the status bar in sync.

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::{
    config::Config,
    constants::{commands, messages},
    output::LogService,
    process::{command::CommandRunner, Spawner},
    python::PythonService,
    status::StatusBar,
    tracker::TrackerService,
    ui::Window,
};

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Collaborators supplied by the host.
pub struct Host {
    pub config: Arc<Config>,
    pub script: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
    pub spawner: Arc<dyn Spawner>,
    pub window: Arc<dyn Window>,
    pub log: LogService,
}

pub struct Extension {
    config: Arc<Config>,
    tracker: TrackerService,
    python: Arc<PythonService>,
    status: StatusBar,
    log: LogService,
}

impl Extension {
    pub fn new(host: Host) -> Self {
        let python = Arc::new(PythonService::new(
            host.runner,
            host.window.clone(),
            host.log.clone(),
        ));
        let tracker = TrackerService::new(
            host.config.clone(),
            host.script,
            python.clone(),
            host.spawner,
            host.window,
            host.log.clone(),
        );
        Self {
            config: host.config,
            tracker,
            python,
            status: StatusBar::new(),
            log: host.log,
        }
    }

    pub fn status(&self) -> &StatusBar {
        &self.status
    }

    pub fn tracker(&self) -> &TrackerService {
        &self.tracker
    }

    pub async fn activate(&mut self) {
        self.status.show();
        self.log.log(messages::EXTENSION_ACTIVATED);

        if self.config.is_launch_on_startup_enabled() {
            self.start_tracker().await;
        }
    }

    pub fn deactivate(&mut self) {
        self.tracker.cleanup();
    }

    /// Deactivates and waits for the tracker to exit, so it can flush its totals.
    pub async fn deactivate_and_wait(&mut self) {
        self.tracker.shutdown().await;
        self.status.set_stopped_state();
    }

    /// Runs one of [`commands::ALL`] by id.
    pub async fn execute_command(&mut self, id: &str) -> Result<(), ExtensionError> {
        match id {
            commands::START => self.start_tracker().await,
            commands::STOP => self.stop_tracker(),
            commands::CHECK_VERSION => self.check_codecarbon_version().await,
            other => return Err(ExtensionError::UnknownCommand(other.to_string())),
        }
        Ok(())
    }

    /// Brings the status bar back in line after an unsolicited tracker exit.
    pub fn sync_status(&mut self) {
        if !self.tracker.is_running() {
            self.status.set_stopped_state();
        }
    }

    async fn start_tracker(&mut self) {
        if self.tracker.start().await {
            self.status.set_running_state();
        }
    }

    fn stop_tracker(&mut self) {
        if self.tracker.stop() {
            self.status.set_stopped_state();
        }
    }

    async fn check_codecarbon_version(&self) {
        let python_path = self.config.python_path();
        self.python.check_codecarbon_version(&python_path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{INTERPRETER, LAUNCH_ON_STARTUP},
        output::MemorySink,
        status::StatusState,
        testing::{FakeRunner, FakeSpawner, FakeWindow, Notice},
    };

    fn extension(
        pairs: &[(&str, &str)],
        runner: FakeRunner,
    ) -> (Extension, Arc<FakeRunner>, Arc<FakeSpawner>, Arc<FakeWindow>, Arc<MemorySink>) {
        let runner = Arc::new(runner);
        let spawner = Arc::new(FakeSpawner::new());
        let window = Arc::new(FakeWindow::default());
        let sink = Arc::new(MemorySink::default());
        let ext = Extension::new(Host {
            config: Arc::new(Config::from_pairs(pairs.iter().copied())),
            script: PathBuf::from("tracker.py"),
            runner: runner.clone(),
            spawner: spawner.clone(),
            window: window.clone(),
            log: LogService::new().with_sink(sink.clone()),
        });
        (ext, runner, spawner, window, sink)
    }

    #[tokio::test]
    async fn activate_launches_when_enabled() {
        let (mut ext, _, spawner, _, sink) =
            extension(&[], FakeRunner::installed("Version: 3.1.0\n"));
        ext.activate().await;
        assert!(ext.status().is_visible());
        assert_eq!(ext.status().state(), StatusState::Running);
        assert_eq!(spawner.children().len(), 1);
        assert_eq!(sink.lines()[0], messages::EXTENSION_ACTIVATED);
        ext.deactivate();
    }

    #[tokio::test]
    async fn activate_respects_launch_flag() {
        let (mut ext, runner, spawner, _, _) = extension(
            &[(LAUNCH_ON_STARTUP, "false")],
            FakeRunner::installed("Version: 3.1.0\n"),
        );
        ext.activate().await;
        assert_eq!(ext.status().state(), StatusState::Idle);
        assert!(spawner.children().is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn commands_toggle_status() {
        let (mut ext, _, _, _, _) = extension(
            &[(LAUNCH_ON_STARTUP, "false")],
            FakeRunner::installed("Version: 3.1.0\n"),
        );
        ext.execute_command(commands::START).await.unwrap();
        assert_eq!(ext.status().state(), StatusState::Running);
        assert_eq!(ext.status().command(), commands::STOP);

        ext.execute_command(commands::STOP).await.unwrap();
        assert_eq!(ext.status().state(), StatusState::Idle);

        ext.execute_command(commands::STOP).await.unwrap();
        assert_eq!(ext.status().state(), StatusState::Idle);
    }

    #[tokio::test]
    async fn refused_install_leaves_status_idle() {
        let (mut ext, _, spawner, window, _) = extension(&[], FakeRunner::missing());
        ext.activate().await;
        assert_eq!(ext.status().state(), StatusState::Idle);
        assert!(spawner.children().is_empty());
        assert_eq!(window.prompts(), 1);
    }

    #[tokio::test]
    async fn check_version_uses_configured_interpreter() {
        let (mut ext, runner, _, window, _) = extension(
            &[(LAUNCH_ON_STARTUP, "false"), (INTERPRETER, "/venv/bin/python")],
            FakeRunner::installed("Version: 2.8.0\n"),
        );
        ext.execute_command(commands::CHECK_VERSION).await.unwrap();
        assert_eq!(runner.calls(), vec!["/venv/bin/python -m pip show codecarbon"]);
        assert_eq!(
            window.notices(),
            vec![Notice::Info("Codecarbon 2.8.0 is installed".to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_command_is_rejected() {
        let (mut ext, _, _, _, _) = extension(&[], FakeRunner::missing());
        let err = ext.execute_command("codecarbon.restart").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown command: codecarbon.restart");
    }

    #[tokio::test]
    async fn sync_status_after_tracker_exit() {
        let (mut ext, _, spawner, _, _) =
            extension(&[], FakeRunner::installed("Version: 3.1.0\n"));
        ext.activate().await;
        spawner.last().unwrap().exit(Some(0));
        for _ in 0..200 {
            if !ext.tracker().is_running() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        ext.sync_status();
        assert_eq!(ext.status().state(), StatusState::Idle);
    }
}
