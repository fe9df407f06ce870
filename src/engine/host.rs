// src/engine/host.rs

//! Host-level side effects of the final action.
//!
//! The sequence talks to a `HostControl` instead of calling
//! `std::process::exit` or the platform shutdown command directly, so tests
//! can record what would have happened without taking the test runner down.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::errors::{KillcordError, Result};

/// Trait abstracting the final action's effects on the host.
pub trait HostControl: Send + Sync {
    /// Power the machine off.
    fn power_off(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Terminate this process with a success status.
    fn exit_success(&self);

    /// Terminate this process abnormally after a fatal error.
    fn abort(&self, error: &KillcordError);
}

/// Production host: runs the configured power-off command and exits the
/// process for real.
#[derive(Debug, Clone)]
pub struct SystemHost {
    power_off_command: Vec<String>,
}

impl SystemHost {
    pub fn new(power_off_command: Vec<String>) -> Self {
        Self { power_off_command }
    }
}

impl HostControl for SystemHost {
    fn power_off(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let (program, args) = self.power_off_command.split_first().ok_or_else(|| {
                KillcordError::PowerOff("no power-off command configured".to_string())
            })?;

            info!(program = %program, ?args, "invoking power-off command");

            let status = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .status()
                .await
                .map_err(|e| KillcordError::PowerOff(format!("starting {program}: {e}")))?;

            if !status.success() {
                return Err(KillcordError::PowerOff(format!(
                    "{program} exited with {status}"
                )));
            }
            Ok(())
        })
    }

    fn exit_success(&self) {
        std::process::exit(0);
    }

    fn abort(&self, _error: &KillcordError) {
        std::process::exit(1);
    }
}
