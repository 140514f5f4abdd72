mod cli;
mod handlers;

use std::{io, sync::Arc};

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;

use codecarbon_tracker::{
    config::{base_dir, Config},
    extension::{Extension, Host},
    output::{ConsoleSink, FileSink, LogService},
    process::{command::TokioCommandRunner, script, ChildSpawner},
    python::PythonService,
    ui::{Console, TerminalWindow},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = cli::Cli::parse();

    let mut cfg = Config::load();
    args.apply(&mut cfg);
    let cfg = Arc::new(cfg);

    let log = output_channel(&cfg, args.verbose)?;
    let console = Arc::new(Console::new(io::stdin().is_terminal()));
    let window = Arc::new(TerminalWindow::new(console.clone()));
    let runner = Arc::new(TokioCommandRunner);

    if args.check_version {
        let python = PythonService::new(runner, window, log);
        python.check_codecarbon_version(&cfg.python_path()).await;
        return Ok(());
    }

    let script = script::resolve(&cfg).context("failed to prepare the tracker script")?;
    let mut ext = Extension::new(Host {
        config: cfg.clone(),
        script,
        runner,
        spawner: Arc::new(ChildSpawner),
        window,
        log,
    });

    ext.activate().await;
    let result = handlers::repl::run(&mut ext, &console).await;
    ext.deactivate_and_wait().await;
    result
}

/// Output channel: the log file, plus stderr when verbose.
fn output_channel(cfg: &Config, verbose: bool) -> Result<LogService> {
    let path = cfg
        .log_path()
        .unwrap_or_else(|| base_dir().join("codecarbon.log"));
    let file = FileSink::open(&path)
        .with_context(|| format!("failed to open output log {}", path.display()))?;
    tracing::debug!(path = %file.path().display(), "output channel");

    let mut log = LogService::new().with_sink(Arc::new(file));
    if verbose {
        log = log.with_sink(Arc::new(ConsoleSink));
    }
    Ok(log)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
