//! docpull CLI - scrape documentation sites into markdown trees.
//!
//! Thin entry point: argument parsing, logging setup, and dispatch into
//! the fetch command. All pipeline behavior lives in docpull-core.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    if cli.list_profiles {
        commands::list_profiles();
        return Ok(());
    }

    commands::fetch(cli).await
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docpull={default_level},docpull_core={default_level}")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
