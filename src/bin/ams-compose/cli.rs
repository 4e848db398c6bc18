//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

/// ams-compose - dependency management for analog/mixed-signal IC design
/// repositories
#[derive(Parser)]
#[command(name = "ams-compose")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ams-compose project
    Init(InitArgs),

    /// Install libraries from ams-compose.yaml
    Install(InstallArgs),

    /// List installed libraries
    List,

    /// Validate configuration and installation state
    Validate,

    /// Remove unused mirrors and orphaned lockfile entries, then validate
    Clean,
}

#[derive(Args)]
pub struct InitArgs {
    /// Default directory for library installations
    #[arg(long, default_value = "designs/libs")]
    pub library_root: String,

    /// Overwrite an existing ams-compose.yaml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Specific libraries to install (all configured libraries if omitted)
    pub libraries: Vec<String>,

    /// Force reinstall even if libraries are up-to-date
    #[arg(long)]
    pub force: bool,

    /// Query upstreams for branch movement on otherwise up-to-date
    /// libraries
    #[arg(long)]
    pub check_remote_updates: bool,
}
