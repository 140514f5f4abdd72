use std::path::PathBuf;

use clap::Parser;
use codecarbon_tracker::config::{self, Config};

#[derive(Parser, Debug, Clone)]
#[command(name = "cctracker", about = "Start and stop a CodeCarbon emissions tracker", version)]
pub struct Cli {
    /// Python interpreter to use; repeat to give fallbacks, the first one wins.
    #[arg(long = "interpreter", value_name = "PATH", action = clap::ArgAction::Append)]
    pub interpreter: Vec<String>,

    /// Do not start tracking when the session opens.
    #[arg(long = "no-launch")]
    pub no_launch: bool,

    /// Append the output channel to this file instead of the default log.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Tracker script to run instead of the bundled one.
    #[arg(long = "script", value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Echo the output channel to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the installed codecarbon version and exit.
    #[arg(long = "check-version")]
    pub check_version: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Applies flag overrides on top of the loaded settings.
    pub fn apply(&self, cfg: &mut Config) {
        if !self.interpreter.is_empty() {
            cfg.update(config::INTERPRETER, self.interpreter.join(","));
        }
        if self.no_launch {
            cfg.update(config::LAUNCH_ON_STARTUP, "false");
        }
        if let Some(path) = &self.log_file {
            cfg.update(config::LOG_PATH, path.to_string_lossy());
        }
        if let Some(path) = &self.script {
            cfg.update(config::TRACKER_SCRIPT, path.to_string_lossy());
        }
    }
}
