//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tickradar - Pattern radar and execution tracker for binary options.
#[derive(Parser, Debug)]
#[command(name = "tickradar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run radar and executor together (foreground)
    Run(ConfigPathArg),

    /// Run only the signal radar
    Radar(ConfigPathArg),

    /// Run only the executor
    Executor(ConfigPathArg),

    /// Validate the configuration file and environment
    CheckConfig(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}
