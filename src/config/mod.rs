use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::constants::DEFAULT_INTERPRETER;

pub const INTERPRETER: &str = "CODECARBON_INTERPRETER";
pub const LAUNCH_ON_STARTUP: &str = "CODECARBON_LAUNCH_ON_STARTUP";
pub const LOG_PATH: &str = "CODECARBON_LOG_PATH";
pub const TRACKER_SCRIPT: &str = "CODECARBON_TRACKER_SCRIPT";

/// Layered settings: defaults < rc file < environment < in-memory updates.
#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    overrides: HashMap<String, String>,
    read_env: bool,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        Self {
            inner: map,
            overrides: HashMap::new(),
            read_env: true,
            config_path: config_path.to_path_buf(),
        }
    }

    /// Builds a config from explicit pairs only; the environment is ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        Self {
            inner: map,
            overrides: HashMap::new(),
            read_env: false,
            config_path: PathBuf::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(key) {
            return Some(v.clone());
        }
        if self.read_env {
            if let Ok(v) = env::var(key) {
                return Some(v);
            }
        }
        self.inner.get(key).cloned()
    }

    /// Accepts true/false, 1/0, yes/no, on/off; anything else warns and yields `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match parse_bool(&raw) {
            Some(b) => b,
            None => {
                tracing::warn!(key, value = %raw, default, "unrecognised boolean setting");
                default
            }
        }
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn update(&mut self, key: &str, value: impl Into<String>) {
        self.overrides.insert(key.to_string(), value.into());
    }

    /// Ordered interpreter list; empty entries are dropped.
    pub fn interpreters(&self) -> Vec<String> {
        self.get(INTERPRETER)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First configured interpreter, or `python`.
    pub fn python_path(&self) -> String {
        self.interpreters()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
    }

    pub fn is_launch_on_startup_enabled(&self) -> bool {
        self.get_bool(LAUNCH_ON_STARTUP, true)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.get_path(LOG_PATH)
    }

    pub fn tracker_script_path(&self) -> Option<PathBuf> {
        self.get_path(TRACKER_SCRIPT)
    }
}

pub fn default_config_path() -> PathBuf {
    base_dir().join("config")
}

/// Directory holding the rc file and the materialized tracker script.
pub fn base_dir() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("codecarbon-tracker")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(INTERPRETER.into(), String::new());
    m.insert(LAUNCH_ON_STARTUP.into(), "true".into());
    m
}
