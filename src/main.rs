mod cli;
mod crawl;
mod error;
mod staging;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use emomo_config::Config;
use emomo_staging::Staging;
use exn::ResultExt;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(path) = cli.staging_path {
        config.staging.path = path;
    }
    let staging = Staging::new(&config.staging.path).or_raise(|| ErrorKind::Staging)?;
    tracing::debug!(root = %staging.root().display(), "Using staging area");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Crawl(args) => crate::crawl::run(args, &config, &staging, &mut stdout).await,
        Command::Staging(command) => {
            crate::staging::run(command, &staging, &mut stdout, &mut std::io::stdin().lock()).await
        },
    }
}
