//! Python tracker child process on top of `tokio::process`.

use std::{io, process::Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};

use super::{OutputStream, SpawnedProcess, Spawner, TrackerProcess};

#[derive(Debug, Default, Clone, Copy)]
pub struct ChildSpawner;

impl Spawner for ChildSpawner {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<SpawnedProcess> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        tracing::debug!(program, ?args, pid = ?child.id(), "spawned tracker");
        let stdout = child.stdout.take().map(|s| Box::new(s) as OutputStream);
        let stderr = child.stderr.take().map(|s| Box::new(s) as OutputStream);

        Ok(SpawnedProcess {
            process: Box::new(PythonChild { child }),
            stdout,
            stderr,
        })
    }
}

struct PythonChild {
    child: Child,
}

#[async_trait]
impl TrackerProcess for PythonChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        // SIGTERM lets the script stop the tracker and print its totals.
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }
}
