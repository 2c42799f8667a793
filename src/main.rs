use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use onwatch::{
    cli::Cli,
    config::Settings,
    register_all, Dispatcher, EventFilter, WatchSession,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.setup_logging();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = Settings::from_cli(cli);
    settings.validate().map_err(anyhow::Error::msg)?;

    // Template problems are reported before anything is registered.
    let renderer = settings.renderer().context("invalid output template")?;

    let mut session =
        WatchSession::open(settings.backend).context("failed to create file system watcher")?;
    let registered = register_all(&mut session, &settings.paths)?;
    tracing::debug!(
        "watching {} paths from {} arguments",
        registered,
        settings.paths.len()
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    ctrlc::set_handler(move || trigger.cancel()).context("failed to install Ctrl+C handler")?;

    let mut dispatcher = Dispatcher::new(
        EventFilter::new(settings.mask),
        renderer,
        io::stdout(),
        io::stderr(),
    );
    let result = dispatcher.run(session.streams_mut(), shutdown).await;
    session.close();

    match result {
        Ok(stats) => {
            tracing::debug!("{:?}", stats);
            Ok(())
        }
        // The reader on the other end of the pipe went away.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("failed to write event"),
    }
}
