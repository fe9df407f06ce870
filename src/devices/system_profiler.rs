// src/devices/system_profiler.rs

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::errors::{KillcordError, Result};

use super::parse::parse_device_list;
use super::{Device, DeviceSource};

/// Enumerates USB devices by running the macOS `system_profiler` tool.
///
/// The program and arguments can be swapped with [`SystemProfiler::with_command`],
/// which is how other inventory tools with the same output shape (and tests)
/// plug in.
#[derive(Debug, Clone)]
pub struct SystemProfiler {
    program: String,
    args: Vec<String>,
}

impl Default for SystemProfiler {
    fn default() -> Self {
        Self::with_command("system_profiler", ["SPUSBDataType"])
    }
}

impl SystemProfiler {
    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    async fn run_tool(&self) -> Result<String> {
        debug!(program = %self.program, args = ?self.args, "enumerating devices");

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    KillcordError::InventoryTool(format!("{} not found in PATH", self.program))
                }
                _ => KillcordError::InventoryTool(format!("running {}: {e}", self.program)),
            })?;

        if !output.status.success() {
            return Err(KillcordError::InventoryTool(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            KillcordError::InventoryTool(format!("{} produced non-UTF-8 output: {e}", self.program))
        })
    }
}

impl DeviceSource for SystemProfiler {
    fn enumerate(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Device>>> + Send + '_>> {
        Box::pin(async move {
            let text = self.run_tool().await?;
            Ok(parse_device_list(&text))
        })
    }
}
