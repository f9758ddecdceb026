//! dockhand CLI - containerized builds driven by a per-project manifest

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("dockhand=debug")
    } else {
        EnvFilter::new("dockhand=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::Dev(args) => commands::dev::execute(args),
        Commands::Info => commands::info::execute(),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
