//! Printers: colored terminal lines for notifications, log entries and status.

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    Cyan,
    Magenta,
    Yellow,
    Red,
    Dimmed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextPrinter {
    pub color: Option<Color>,
}

impl TextPrinter {
    pub fn new(color: Color) -> Self {
        Self { color: Some(color) }
    }

    pub fn paint(&self, text: &str) -> String {
        match self.color {
            Some(Color::Green) => text.green().to_string(),
            Some(Color::Cyan) => text.cyan().to_string(),
            Some(Color::Magenta) => text.magenta().to_string(),
            Some(Color::Yellow) => text.yellow().to_string(),
            Some(Color::Red) => text.red().to_string(),
            Some(Color::Dimmed) => text.dimmed().to_string(),
            None => text.to_string(),
        }
    }

    pub fn print(&self, text: &str) {
        println!("{}", self.paint(text));
    }

    pub fn eprint(&self, text: &str) {
        eprintln!("{}", self.paint(text));
    }
}
