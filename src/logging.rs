// src/logging.rs

//! Logging setup for `killcord` using `tracing` + `tracing-subscriber`.
//!
//! Which events get through is decided by [`log_filter`]:
//! 1. `--log-level` CLI flag (if provided) sets one global level
//! 2. `KILLCORD_LOG` environment variable, in `EnvFilter` directive syntax
//!    (`debug`, `killcord::exec=trace,info`, ...)
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that `killcord devices` output stays clean.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "KILLCORD_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = log_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))?;

    Ok(())
}

/// Build the event filter from the CLI level and the raw `KILLCORD_LOG`
/// value. A blank environment value counts as unset; a malformed one is an
/// error rather than being silently ignored.
pub fn log_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level_directive(level)));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV_VAR} value '{directives}'")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
