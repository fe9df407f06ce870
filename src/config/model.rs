// src/config/model.rs

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{KillcordError, Result};
use crate::types::{ExecMode, FinalAction};

/// Marker on the first token of a raw command line selecting async mode.
pub const ASYNC_MARKER: char = '!';

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [shutdown]
/// timeout_ms = 5000
/// power_off = true
/// commands = [
///   "sync",
///   "!/usr/local/bin/lock-vault --now",
///   { program = "/sbin/umount", args = ["/Volumes/secret"], mode = "async" },
/// ]
///
/// [monitor]
/// poll_interval_ms = 500
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub shutdown: ShutdownSection,

    #[serde(default)]
    pub monitor: MonitorSection,
}

/// `[shutdown]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSection {
    /// Time budget for the whole command list, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Power the host off once the commands are done (or timed out).
    /// When `false`, the agent just exits with a success status.
    #[serde(default)]
    pub power_off: bool,

    /// Program + arguments used as the power-off primitive.
    ///
    /// If `None`, a platform default is used.
    #[serde(default)]
    pub power_off_command: Option<Vec<String>>,

    /// Commands to run, in order.
    #[serde(default)]
    pub commands: Vec<RawCommand>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            power_off: false,
            power_off_command: None,
            commands: Vec::new(),
        }
    }
}

/// A command entry as written in the config file.
///
/// Either a whitespace-delimited command line (leading `!` on the program
/// selects async mode), or a table with an explicit `mode`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawCommand {
    Line(String),
    Structured {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        mode: ExecMode,
    },
}

/// `[monitor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// How often the device inventory is re-read.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Location IDs to watch. Empty means every device present at startup.
    #[serde(default)]
    pub devices: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            devices: Vec::new(),
        }
    }
}

impl MonitorSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One configured command: program, arguments and execution mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub mode: ExecMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, mode: ExecMode) -> Self {
        Self {
            program: program.into(),
            args,
            mode,
        }
    }

    /// Parse a whitespace-delimited command line.
    ///
    /// A leading `!` on the first token selects [`ExecMode::Async`] and is
    /// stripped from the program name.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let first = tokens
            .next()
            .ok_or_else(|| KillcordError::ConfigError("empty command line".to_string()))?;

        let (program, mode) = match first.strip_prefix(ASYNC_MARKER) {
            Some(rest) => (rest, ExecMode::Async),
            None => (first, ExecMode::Sync),
        };

        if program.is_empty() {
            return Err(KillcordError::ConfigError(format!(
                "command line {line:?} has no program after the async marker"
            )));
        }

        Ok(Self::new(
            program,
            tokens.map(str::to_string).collect(),
            mode,
        ))
    }

    pub fn is_async(&self) -> bool {
        self.mode == ExecMode::Async
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl TryFrom<&RawCommand> for CommandSpec {
    type Error = KillcordError;

    fn try_from(raw: &RawCommand) -> Result<Self> {
        match raw {
            RawCommand::Line(line) => CommandSpec::parse_line(line),
            RawCommand::Structured {
                program,
                args,
                mode,
            } => {
                if program.trim().is_empty() {
                    return Err(KillcordError::ConfigError(
                        "structured command has an empty `program`".to_string(),
                    ));
                }
                Ok(CommandSpec::new(program.clone(), args.clone(), *mode))
            }
        }
    }
}

/// Everything the shutdown sequence needs; read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownConfig {
    pub timeout: Duration,
    pub commands: Vec<CommandSpec>,
    pub final_action: FinalAction,
}

impl ShutdownConfig {
    pub fn new(timeout: Duration, commands: Vec<CommandSpec>, final_action: FinalAction) -> Self {
        Self {
            timeout,
            commands,
            final_action,
        }
    }
}

/// Validated configuration.
///
/// Obtain one via `ConfigFile::try_from(RawConfigFile)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub shutdown: ShutdownConfig,
    pub power_off_command: Vec<String>,
    pub monitor: MonitorSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        shutdown: ShutdownConfig,
        power_off_command: Vec<String>,
        monitor: MonitorSection,
    ) -> Self {
        Self {
            shutdown,
            power_off_command,
            monitor,
        }
    }
}

/// Platform default for the power-off primitive.
pub fn default_power_off_command() -> Vec<String> {
    let parts: &[&str] = if cfg!(windows) {
        &["shutdown", "/s", "/t", "0"]
    } else {
        &["shutdown", "-h", "now"]
    };
    parts.iter().map(|s| s.to_string()).collect()
}
