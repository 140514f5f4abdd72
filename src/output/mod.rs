//! Output channel: an append-only, line-oriented log with three severities.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    constants::EMISSIONS_KEYWORD,
    printer::{Color, TextPrinter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("info"),
            Level::Warning => f.write_str("warning"),
            Level::Error => f.write_str("error"),
        }
    }
}

/// Destination for output channel lines.
pub trait OutputSink: Send + Sync {
    fn append(&self, level: Level, line: &str);
}

/// Appends `[level] line` entries to a file, creating parent directories.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn append(&self, level: Level, line: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", level, line);
        }
    }
}

/// Prints entries to stderr; warnings yellow, errors red.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn append(&self, level: Level, line: &str) {
        let printer = match level {
            Level::Info => TextPrinter::new(Color::Dimmed),
            Level::Warning => TextPrinter::new(Color::Yellow),
            Level::Error => TextPrinter::new(Color::Red),
        };
        printer.eprint(line);
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, l)| l).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|(_, l)| l.contains(needle))
    }
}

impl OutputSink for MemorySink {
    fn append(&self, level: Level, line: &str) {
        if let Ok(mut e) = self.entries.lock() {
            e.push((level, line.to_string()));
        }
    }
}

/// The shared output channel. Cloning shares the same sinks.
#[derive(Clone, Default)]
pub struct LogService {
    sinks: Vec<Arc<dyn OutputSink>>,
}

impl LogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn log(&self, message: &str) {
        tracing::info!(target: "codecarbon::output", "{}", message);
        self.append(Level::Info, message);
    }

    pub fn log_warning(&self, message: &str) {
        tracing::warn!(target: "codecarbon::output", "{}", message);
        self.append(Level::Warning, message);
    }

    pub fn log_error(&self, message: &str) {
        tracing::error!(target: "codecarbon::output", "{}", message);
        self.append(Level::Error, message);
    }

    /// Re-emits every line mentioning emissions as an `Emissions update`.
    pub fn parse_logs(&self, data: &str) {
        for line in data.split('\n') {
            if line.contains(EMISSIONS_KEYWORD) {
                self.log(&format!("Emissions update: {}", line.trim()));
            }
        }
    }

    fn append(&self, level: Level, line: &str) {
        for sink in &self.sinks {
            sink.append(level, line);
        }
    }
}

impl fmt::Debug for LogService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogService")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_log() -> (LogService, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (LogService::new().with_sink(sink.clone()), sink)
    }

    #[test]
    fn levels_are_kept() {
        let (log, sink) = memory_log();
        log.log("a");
        log.log_warning("b");
        log.log_error("c");
        assert_eq!(
            sink.entries(),
            vec![
                (Level::Info, "a".to_string()),
                (Level::Warning, "b".to_string()),
                (Level::Error, "c".to_string()),
            ]
        );
    }

    #[test]
    fn parse_logs_picks_emission_lines() {
        let (log, sink) = memory_log();
        log.parse_logs("Tracker started.\n  Total emissions: 0.0012  \nother\n");
        assert_eq!(sink.lines(), vec!["Emissions update: Total emissions: 0.0012"]);
    }

    #[test]
    fn parse_logs_is_case_sensitive() {
        let (log, sink) = memory_log();
        log.parse_logs("Emissions rate\n");
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn file_sink_appends_tagged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("codecarbon.log");
        let sink = Arc::new(FileSink::open(&path).unwrap());
        let log = LogService::new().with_sink(sink.clone());
        log.log("hello");
        log.log_error("boom");
        drop(log);
        drop(sink);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[info] hello\n[error] boom\n");
    }
}
