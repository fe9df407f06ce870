// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    default_power_off_command, CommandSpec, ConfigFile, RawConfigFile, ShutdownConfig,
};
use crate::errors::{KillcordError, Result};
use crate::types::FinalAction;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::KillcordError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let commands = raw
            .shutdown
            .commands
            .iter()
            .map(CommandSpec::try_from)
            .collect::<Result<Vec<_>>>()?;

        let shutdown = ShutdownConfig::new(
            Duration::from_millis(raw.shutdown.timeout_ms),
            commands,
            FinalAction::from_power_off_flag(raw.shutdown.power_off),
        );

        let power_off_command = raw
            .shutdown
            .power_off_command
            .unwrap_or_else(default_power_off_command);

        Ok(ConfigFile::new_unchecked(shutdown, power_off_command, raw.monitor))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_shutdown_section(cfg)?;
    validate_monitor_section(cfg)?;
    Ok(())
}

fn validate_shutdown_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.shutdown.timeout_ms == 0 {
        return Err(KillcordError::ConfigError(
            "[shutdown].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(cmd) = &cfg.shutdown.power_off_command {
        if cmd.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(KillcordError::ConfigError(
                "[shutdown].power_off_command must name a program".to_string(),
            ));
        }
    }

    // An empty command list is allowed: the sequence then does nothing at all.
    Ok(())
}

fn validate_monitor_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.monitor.poll_interval_ms == 0 {
        return Err(KillcordError::ConfigError(
            "[monitor].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
