mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let filter = match cli.verbose {
        0 => "chanmerge=info",
        1 => "chanmerge=debug",
        2 => "chanmerge=trace",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Some(Commands::Run { options }) => commands::run::run(&options, cli.config.as_deref()).await,
        Some(Commands::Probe {
            urls,
            timeout,
            concurrency,
        }) => commands::probe::run(&urls, timeout, concurrency, cli.config.as_deref()).await,
        Some(Commands::Config) => commands::config::run(cli.config.as_deref()).await,
        // A bare invocation runs the pipeline
        None => commands::run::run(&cli.run, cli.config.as_deref()).await,
    }
}
