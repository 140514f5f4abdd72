//! Status indicator mirroring whether the tracker runs.

use crate::{
    constants::{commands, DEFAULT_STATUS_BAR_TEXT},
    printer::{Color, TextPrinter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusState {
    #[default]
    Idle,
    Running,
}

impl StatusState {
    pub fn label(&self) -> String {
        match self {
            StatusState::Idle => DEFAULT_STATUS_BAR_TEXT.to_string(),
            StatusState::Running => format!("{} (Running)", DEFAULT_STATUS_BAR_TEXT),
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            StatusState::Idle => "Start CodeCarbon tracker",
            StatusState::Running => "Stop CodeCarbon tracker",
        }
    }

    /// Command bound to the indicator.
    pub fn command(&self) -> &'static str {
        match self {
            StatusState::Idle => commands::START,
            StatusState::Running => commands::STOP,
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusBar {
    state: StatusState,
    visible: bool,
}

impl StatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn state(&self) -> StatusState {
        self.state
    }

    pub fn set_running_state(&mut self) {
        self.state = StatusState::Running;
    }

    pub fn set_stopped_state(&mut self) {
        self.state = StatusState::Idle;
    }

    pub fn label(&self) -> String {
        self.state.label()
    }

    pub fn tooltip(&self) -> &'static str {
        self.state.tooltip()
    }

    pub fn command(&self) -> &'static str {
        self.state.command()
    }

    /// One-line terminal rendering; `None` while hidden.
    pub fn render(&self) -> Option<String> {
        if !self.visible {
            return None;
        }
        let color = match self.state {
            StatusState::Idle => Color::Magenta,
            StatusState::Running => Color::Green,
        };
        Some(format!(
            "{}  {}",
            TextPrinter::new(color).paint(&self.label()),
            TextPrinter::new(Color::Dimmed).paint(&format!("{} ({})", self.tooltip(), self.command())),
        ))
    }
}
