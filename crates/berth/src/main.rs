//! Berth CLI - install, remove and register cluster extensions

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before any TLS operation
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = commands::load_config(&cli.global)?;
    match cli.command {
        Commands::Install(args) => commands::install::run(args, config).await,
        Commands::Uninstall(args) => commands::uninstall::run(args, config).await,
        Commands::Register(args) => commands::registry::register(args, config).await,
        Commands::Unregister(args) => commands::registry::unregister(args, config).await,
        Commands::List => commands::registry::list(config).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
