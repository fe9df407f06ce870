// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `killcord`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "killcord",
    version,
    about = "Run shutdown-preparation commands and power off when a USB device is pulled.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `KILLCORD_CONFIG`, or `Killcord.toml` in the current working
    /// directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `KILLCORD_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// What to do. Defaults to `watch`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Watch the attached devices and run the shutdown sequence when one is removed.
    Watch,

    /// Run the shutdown sequence right now.
    Trigger,

    /// Print the currently attached devices.
    Devices,

    /// Parse + validate the config and print the plan, without running anything.
    Check,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
