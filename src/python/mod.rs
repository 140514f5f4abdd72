//! Package manager bridge: pip queries, installs and the install prompt flow.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::{
    constants::{messages, PYTHON_PACKAGE_NAME},
    output::LogService,
    process::command::{CommandError, CommandOutput, CommandRunner},
    ui::{InstallChoice, Window},
};

#[derive(Debug, Error)]
#[error("Failed to install {package}: {stderr}")]
pub struct InstallError {
    pub package: String,
    pub stderr: String,
}

/// Fields of interest in `pip show` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub version: Option<String>,
    pub location: Option<String>,
}

impl PackageInfo {
    pub fn parse(output: &str) -> Self {
        static VERSION: OnceLock<Regex> = OnceLock::new();
        static LOCATION: OnceLock<Regex> = OnceLock::new();
        let version = VERSION.get_or_init(|| Regex::new(r"Version: (.+)").expect("valid regex"));
        let location = LOCATION.get_or_init(|| Regex::new(r"Location: (.+)").expect("valid regex"));

        let capture = |re: &Regex| {
            re.captures(output)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };
        Self {
            version: capture(version),
            location: capture(location),
        }
    }
}

/// What the tracker needs from the bridge before spawning.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    async fn ensure_codecarbon_installed(&self, python_path: &str) -> bool;
}

pub struct PythonService {
    runner: Arc<dyn CommandRunner>,
    window: Arc<dyn Window>,
    log: LogService,
}

impl PythonService {
    pub fn new(runner: Arc<dyn CommandRunner>, window: Arc<dyn Window>, log: LogService) -> Self {
        Self { runner, window, log }
    }

    async fn pip_show(&self, python_path: &str, package: &str) -> Result<CommandOutput, CommandError> {
        self.runner
            .run(python_path, &["-m", "pip", "show", package])
            .await
    }

    /// False on any failure; a missing interpreter and a missing package look the same.
    pub async fn is_package_installed(&self, python_path: &str, package: &str) -> bool {
        match self.pip_show(python_path, package).await {
            Ok(out) => {
                if let Some(version) = PackageInfo::parse(&out.stdout).version {
                    self.log.log(&format!("Found {} version: {}", package, version));
                }
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, package, "pip show failed");
                false
            }
        }
    }

    pub async fn install_package(&self, python_path: &str, package: &str) -> Result<(), InstallError> {
        self.runner
            .run(python_path, &["-m", "pip", "install", package])
            .await
            .map(|_| ())
            .map_err(|e| InstallError {
                package: package.to_string(),
                stderr: e.stderr(),
            })
    }

    pub async fn ensure_codecarbon_installed(&self, python_path: &str) -> bool {
        self.log.log(&format!(
            "Checking codecarbon installation with Python: {}",
            python_path
        ));
        if self.is_package_installed(python_path, PYTHON_PACKAGE_NAME).await {
            return true;
        }

        match self.window.pick_install_option(messages::INSTALL_PROMPT).await {
            Some(InstallChoice::Latest) => self.install_latest_version(python_path).await,
            Some(InstallChoice::SpecificVersion) => self.install_specific_version(python_path).await,
            Some(InstallChoice::Cancel) | None => false,
        }
    }

    async fn install_latest_version(&self, python_path: &str) -> bool {
        self.window
            .show_information("Installing codecarbon (latest version)...");
        match self.install_package(python_path, PYTHON_PACKAGE_NAME).await {
            Ok(()) => {
                self.window.show_information(messages::INSTALL_SUCCESS);
                self.is_package_installed(python_path, PYTHON_PACKAGE_NAME).await;
                true
            }
            Err(e) => {
                self.window
                    .show_error(&format!("{}: {}", messages::INSTALL_FAILED, e));
                false
            }
        }
    }

    async fn install_specific_version(&self, python_path: &str) -> bool {
        let Some(version) = self
            .window
            .input_box(messages::VERSION_PROMPT, messages::VERSION_PLACEHOLDER)
            .await
            .filter(|v| !v.is_empty())
        else {
            return false;
        };

        self.window
            .show_information(&format!("Installing codecarbon version {}...", version));
        let spec = format!("{}=={}", PYTHON_PACKAGE_NAME, version);
        match self.install_package(python_path, &spec).await {
            Ok(()) => {
                self.window
                    .show_information(&format!("Successfully installed codecarbon {}", version));
                self.is_package_installed(python_path, PYTHON_PACKAGE_NAME).await;
                true
            }
            Err(e) => {
                self.window
                    .show_error(&format!("Failed to install codecarbon {}: {}", version, e));
                false
            }
        }
    }

    pub async fn check_codecarbon_version(&self, python_path: &str) {
        let out = match self.pip_show(python_path, PYTHON_PACKAGE_NAME).await {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, "version check failed");
                self.window
                    .show_warning(messages::CHECK_VERSION_NOT_INSTALLED);
                self.log.log(messages::NOT_INSTALLED);
                return;
            }
        };

        let info = PackageInfo::parse(&out.stdout);
        let Some(version) = info.version else {
            self.window.show_error(messages::VERSION_ERROR);
            return;
        };
        let location = info.location.unwrap_or_else(|| "Unknown".to_string());

        self.window
            .show_information(&format!("Codecarbon {} is installed", version));
        self.log.log(&format!("Codecarbon version: {}", version));
        self.log.log(&format!("Installation location: {}", location));
        self.log.log(&format!("Python interpreter: {}", python_path));
    }
}

#[async_trait]
impl DependencyCheck for PythonService {
    async fn ensure_codecarbon_installed(&self, python_path: &str) -> bool {
        PythonService::ensure_codecarbon_installed(self, python_path).await
    }
}
