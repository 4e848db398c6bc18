//! ams-compose CLI - dependency management for analog/mixed-signal IC design

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("ams_compose=debug")
    } else {
        EnvFilter::new("ams_compose=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args),
        Commands::Install(args) => commands::install::execute(args),
        Commands::List => commands::list::execute(),
        Commands::Validate => commands::validate::execute(),
        Commands::Clean => commands::clean::execute(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
