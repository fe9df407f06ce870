// src/exec/runner.rs

//! Runs one configured command, either inline or in the background.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};

use crate::config::CommandSpec;
use crate::exec::pending::{PendingGuard, PendingTracker};
use crate::exec::registry::{ProcessHandle, ProcessRegistry};

/// How a single command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// Exited unsuccessfully; `None` when terminated by a signal.
    Failed(Option<i32>),
    /// Could not be started or waited on.
    Error,
    /// Killed because the shutdown timeout fired.
    Killed,
}

impl CommandOutcome {
    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            CommandOutcome::Success
        } else {
            CommandOutcome::Failed(status.code())
        }
    }
}

/// Starts commands and keeps the bookkeeping for asynchronous ones:
/// their handles go into the shared [`ProcessRegistry`] and each holds a
/// [`PendingGuard`] until it exits.
///
/// Errors are logged here and never returned; the shutdown sequence always
/// moves on to the next command.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    registry: Arc<ProcessRegistry>,
    pending: PendingTracker,
}

impl CommandRunner {
    pub fn new(registry: Arc<ProcessRegistry>, pending: PendingTracker) -> Self {
        Self { registry, pending }
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    /// Start the command and wait for it to exit.
    pub async fn run_sync(&self, spec: &CommandSpec) -> CommandOutcome {
        match run_sync_inner(spec).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(cmd = %spec, error = %err, "error while running command");
                CommandOutcome::Error
            }
        }
    }

    /// Start the command and return immediately.
    ///
    /// On success the process is registered, counted as pending, and watched
    /// by a background task whose handle is returned. A start failure is
    /// logged and returns `None` without touching the pending count.
    pub fn spawn_async(&self, spec: &CommandSpec) -> Option<JoinHandle<CommandOutcome>> {
        let child = match start(spec) {
            Ok(child) => child,
            Err(err) => {
                error!(cmd = %spec, error = %err, "error starting parallel command");
                return None;
            }
        };

        let label = spec.to_string();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        self.registry
            .add(ProcessHandle::new(label.clone(), child.id(), kill_tx));
        let guard = self.pending.begin();

        let handle = tokio::spawn(
            supervise(label, child, kill_rx, guard).with_current_subscriber(),
        );
        Some(handle)
    }
}

async fn run_sync_inner(spec: &CommandSpec) -> Result<CommandOutcome> {
    let mut child = start(spec)?;
    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for command '{spec}'"))?;

    let outcome = CommandOutcome::from_status(status);
    log_exit(&spec.to_string(), status);
    Ok(outcome)
}

/// Wait for an asynchronous command to exit, or kill it when the registry
/// asks for it.
async fn supervise(
    label: String,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    _guard: PendingGuard,
) -> CommandOutcome {
    tokio::select! {
        status_res = child.wait() => outcome_of_wait(&label, status_res),

        kill = kill_rx => match kill {
            Ok(()) => {
                // On unix the registry has already sent SIGKILL.
                if let Err(e) = child.start_kill() {
                    debug!(cmd = %label, error = %e, "failed to kill parallel command");
                }
                if let Err(e) = child.wait().await {
                    debug!(cmd = %label, error = %e, "failed to reap killed command");
                }
                CommandOutcome::Killed
            }
            Err(_) => {
                // Registry dropped without a kill request; keep supervising.
                let status_res = child.wait().await;
                outcome_of_wait(&label, status_res)
            }
        },
    }
}

fn outcome_of_wait(label: &str, status_res: std::io::Result<ExitStatus>) -> CommandOutcome {
    match status_res {
        Ok(status) => {
            log_exit(label, status);
            CommandOutcome::from_status(status)
        }
        Err(e) => {
            error!(cmd = %label, error = %e, "error while running parallel command");
            CommandOutcome::Error
        }
    }
}

fn log_exit(label: &str, status: ExitStatus) {
    if status.success() {
        info!(cmd = %label, "command finished");
    } else {
        warn!(
            cmd = %label,
            exit_code = ?status.code(),
            "command exited unsuccessfully"
        );
    }
}

/// Spawn the process with piped output that is forwarded to the log.
fn start(spec: &CommandSpec) -> Result<Child> {
    info!(cmd = %spec, mode = %spec.mode, "starting command");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for command '{spec}'"))?;

    let label = spec.to_string();
    if let Some(stdout) = child.stdout.take() {
        forward_lines(label.clone(), "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(label, "stderr", stderr);
    }

    Ok(child)
}

/// Always drain child output so pipes don't fill; log it at debug.
fn forward_lines<R>(label: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(cmd = %label, stream, "{}", line);
            }
        }
        .with_current_subscriber(),
    );
}
