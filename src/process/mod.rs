//! External process boundary: spawning, output streams, termination.

use std::io;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub mod command;
pub mod python;
pub mod script;

pub use python::ChildSpawner;

pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// A spawned tracker child as seen by its exit watcher.
#[async_trait]
pub trait TrackerProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit; does not wait.
    fn terminate(&mut self) -> io::Result<()>;

    /// Resolves with the exit code once the process is gone (`None` when killed by a signal).
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

pub struct SpawnedProcess {
    pub process: Box<dyn TrackerProcess>,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
}

pub trait Spawner: Send + Sync {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<SpawnedProcess>;
}
