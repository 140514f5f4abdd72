//! Host window: notifications and interactive prompts.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    sync::Mutex,
};

use crate::{
    constants::install_options,
    printer::{Color, TextPrinter},
};

/// User answer to the missing-package prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallChoice {
    Latest,
    SpecificVersion,
    Cancel,
}

impl InstallChoice {
    pub fn label(&self) -> &'static str {
        match self {
            InstallChoice::Latest => install_options::LATEST,
            InstallChoice::SpecificVersion => install_options::SPECIFIC,
            InstallChoice::Cancel => install_options::CANCEL,
        }
    }

    /// Parses a terminal answer: `l`, `s`, `c`, `1`..`3` or a full label.
    pub fn parse(answer: &str) -> Option<Self> {
        let a = answer.trim().to_ascii_lowercase();
        match a.as_str() {
            "l" | "1" | "latest" => Some(Self::Latest),
            "s" | "2" | "specific" => Some(Self::SpecificVersion),
            "c" | "3" | "cancel" => Some(Self::Cancel),
            _ => [Self::Latest, Self::SpecificVersion, Self::Cancel]
                .into_iter()
                .find(|c| c.label().eq_ignore_ascii_case(&a)),
        }
    }
}

#[async_trait]
pub trait Window: Send + Sync {
    fn show_information(&self, message: &str);
    fn show_warning(&self, message: &str);
    fn show_error(&self, message: &str);

    /// Warning prompt offering the install options; `None` when dismissed.
    async fn pick_install_option(&self, message: &str) -> Option<InstallChoice>;

    /// Free-text input; `None` when cancelled or left empty.
    async fn input_box(&self, prompt: &str, placeholder: &str) -> Option<String>;
}

/// Single reader over stdin, shared by the command loop and prompts.
pub struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    interactive: bool,
}

impl Console {
    pub fn new(interactive: bool) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            interactive,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Prints `prompt` and reads one line; `None` on EOF.
    pub async fn read_line(&self, prompt: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(prompt.as_bytes()).await;
        let _ = stdout.flush().await;
        let mut lines = self.lines.lock().await;
        lines.next_line().await.ok().flatten()
    }
}

/// Terminal rendition of the host window.
pub struct TerminalWindow {
    console: Arc<Console>,
}

impl TerminalWindow {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl Window for TerminalWindow {
    fn show_information(&self, message: &str) {
        TextPrinter::new(Color::Cyan).print(message);
    }

    fn show_warning(&self, message: &str) {
        TextPrinter::new(Color::Yellow).print(message);
    }

    fn show_error(&self, message: &str) {
        TextPrinter::new(Color::Red).print(message);
    }

    async fn pick_install_option(&self, message: &str) -> Option<InstallChoice> {
        self.show_warning(message);
        if !self.console.is_interactive() {
            return None;
        }
        let answer = self
            .console
            .read_line("[L]atest, [S]pecific version, [C]ancel: ")
            .await?;
        InstallChoice::parse(&answer)
    }

    async fn input_box(&self, prompt: &str, placeholder: &str) -> Option<String> {
        if !self.console.is_interactive() {
            return None;
        }
        let answer = self
            .console
            .read_line(&format!("{} [{}]: ", prompt, placeholder))
            .await?;
        let answer = answer.trim();
        if answer.is_empty() {
            None
        } else {
            Some(answer.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_answers() {
        assert_eq!(InstallChoice::parse("l"), Some(InstallChoice::Latest));
        assert_eq!(InstallChoice::parse(" S "), Some(InstallChoice::SpecificVersion));
        assert_eq!(InstallChoice::parse("3"), Some(InstallChoice::Cancel));
        assert_eq!(
            InstallChoice::parse("install specific version"),
            Some(InstallChoice::SpecificVersion)
        );
        assert_eq!(InstallChoice::parse(""), None);
        assert_eq!(InstallChoice::parse("yes"), None);
    }
}
