//! Bundled tracker script, written to disk on demand.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::config::{base_dir, Config};

pub const TRACKER_SCRIPT: &str = include_str!("../../scripts/tracker.py");
pub const TRACKER_SCRIPT_NAME: &str = "tracker.py";

/// Argument the script expects to begin tracking.
pub const START_ARG: &str = "start";

/// Writes the bundled script into `dir` unless an identical copy is already there.
pub fn materialize(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(TRACKER_SCRIPT_NAME);
    if fs::read_to_string(&path).ok().as_deref() == Some(TRACKER_SCRIPT) {
        return Ok(path);
    }
    fs::create_dir_all(dir)?;
    fs::write(&path, TRACKER_SCRIPT)?;
    Ok(path)
}

/// Configured script path, or the bundled script under the app config dir.
pub fn resolve(cfg: &Config) -> io::Result<PathBuf> {
    match cfg.tracker_script_path() {
        Some(path) => Ok(path),
        None => materialize(&base_dir()),
    }
}
