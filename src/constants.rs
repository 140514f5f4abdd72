//! Fixed strings shared across the crate: package name, command ids, messages.

pub const PYTHON_PACKAGE_NAME: &str = "codecarbon";
pub const DEFAULT_STATUS_BAR_TEXT: &str = "$(pulse) Codecarbon";
pub const DEFAULT_INTERPRETER: &str = "python";

/// Keyword the log parser looks for in tracker stdout.
pub const EMISSIONS_KEYWORD: &str = "emissions";

pub mod commands {
    pub const START: &str = "codecarbon.start";
    pub const STOP: &str = "codecarbon.stop";
    pub const CHECK_VERSION: &str = "codecarbon.checkVersion";

    pub const ALL: &[&str] = &[START, STOP, CHECK_VERSION];
}

pub mod messages {
    pub const ALREADY_RUNNING: &str = "Codecarbon tracker is already running.";
    pub const NOT_RUNNING: &str = "Codecarbon tracker is not running.";
    pub const TRACKER_STARTED: &str = "Codecarbon tracker started";
    pub const TRACKER_STOPPED: &str = "Codecarbon tracker stopped";
    pub const EXTENSION_ACTIVATED: &str = "Codecarbon extension activated";
    pub const NOT_INSTALLED: &str = "Codecarbon is not installed";
    pub const INSTALL_PROMPT: &str =
        "The Python package \"codecarbon\" is not installed. Would you like to install it?";
    pub const INSTALL_SUCCESS: &str = "Successfully installed codecarbon";
    pub const INSTALL_FAILED: &str = "Failed to install codecarbon";
    pub const VERSION_PROMPT: &str = "Enter codecarbon version to install (e.g., 3.1.0)";
    pub const VERSION_PLACEHOLDER: &str = "3.1.0";
    pub const CHECK_VERSION_NOT_INSTALLED: &str =
        "Codecarbon is not installed. Use \"Start tracking emissions\" to install it.";
    pub const VERSION_ERROR: &str = "Could not determine codecarbon version";
}

pub mod install_options {
    pub const LATEST: &str = "Install Latest";
    pub const SPECIFIC: &str = "Install Specific Version";
    pub const CANCEL: &str = "Cancel";
}
