//! Command loop: reads command ids (or short aliases) from the console.

use anyhow::Result;

use codecarbon_tracker::{
    constants::commands,
    extension::Extension,
    printer::{Color, TextPrinter},
    ui::Console,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(&'static str),
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let word = line.trim();
        if let Some(id) = commands::ALL.iter().copied().find(|id| *id == word) {
            return Input::Command(id);
        }
        match word.to_ascii_lowercase().as_str() {
            "" => Input::Empty,
            "start" => Input::Command(commands::START),
            "stop" => Input::Command(commands::STOP),
            "version" | "check-version" => Input::Command(commands::CHECK_VERSION),
            "status" => Input::Status,
            "help" | "?" => Input::Help,
            "quit" | "exit" | "q" => Input::Quit,
            _ => Input::Unknown(word.to_string()),
        }
    }
}

const HELP: &str = "Commands: start, stop, version, status, help, quit\n\
(or the ids codecarbon.start, codecarbon.stop, codecarbon.checkVersion)";

/// Runs until `quit`, end of input, or Ctrl-C.
pub async fn run(ext: &mut Extension, console: &Console) -> Result<()> {
    TextPrinter::new(Color::Dimmed).print(HELP);
    print_status(ext);

    loop {
        let line = tokio::select! {
            line = console.read_line("> ") => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match Input::parse(&line) {
            Input::Command(id) => {
                ext.execute_command(id).await?;
                ext.sync_status();
                print_status(ext);
            }
            Input::Status => {
                ext.sync_status();
                print_status(ext);
            }
            Input::Help => TextPrinter::new(Color::Dimmed).print(HELP),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(word) => {
                TextPrinter::new(Color::Yellow).print(&format!("Unknown command: {}", word));
            }
        }
    }
    Ok(())
}

fn print_status(ext: &Extension) {
    if let Some(line) = ext.status().render() {
        match ext.tracker().pid() {
            Some(pid) => println!("{}  pid {}", line, pid),
            None => println!("{}", line),
        }
    }
}
