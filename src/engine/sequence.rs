// src/engine/sequence.rs

//! The shutdown sequence: run the configured commands under a deadline and
//! perform the final action exactly once.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch};

use crate::config::{CommandSpec, ShutdownConfig};
use crate::errors::{KillcordError, Result};
use crate::exec::{CommandRunner, PendingTracker, ProcessRegistry};
use crate::types::{ExecMode, FinalAction};

use super::host::HostControl;
use super::Resolution;

/// Drives one run of the configured shutdown commands.
///
/// ```text
/// Running ──(all commands exited)──> Completed ─┐
///    └─────(timeout fired, kill_all)─> TimedOut ─┴─> final action (once)
/// ```
///
/// Three tasks cooperate:
/// - the dispatch task runs the commands in order (sync ones inline) and then
///   spawns the completion watcher;
/// - the completion watcher waits for the pending count to reach zero and
///   fires the one-shot completion signal;
/// - the race selector waits for completion or the deadline, whichever comes
///   first, and then performs the final action.
///
/// All three, and every task they spawn, log through the dispatcher that was
/// current when the sequence was built (or the one given to
/// [`ShutdownSequence::with_dispatch`]).
pub struct ShutdownSequence<H: HostControl + 'static> {
    config: ShutdownConfig,
    host: Arc<H>,
    registry: Arc<ProcessRegistry>,
    dispatch: Dispatch,
}

impl<H: HostControl + 'static> fmt::Debug for ShutdownSequence<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSequence")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<H: HostControl + 'static> ShutdownSequence<H> {
    pub fn new(config: ShutdownConfig, host: Arc<H>) -> Self {
        Self {
            config,
            host,
            registry: Arc::new(ProcessRegistry::new()),
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Log through `dispatch` instead of the dispatcher current at construction.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Registry holding the handles of the async commands of this run.
    pub fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run the sequence.
    ///
    /// Returns `Ok(None)` without doing anything (no timer, no processes, no
    /// final action) when no commands are configured. Otherwise returns how
    /// the race was resolved, once the final action has been performed. With
    /// [`super::SystemHost`] the final action ends the process, so this only
    /// returns when a different host is plugged in.
    ///
    /// A synchronous command that is still running when the deadline passes
    /// is neither killed nor awaited; it keeps running in the background.
    pub async fn run(self) -> Result<Option<Resolution>> {
        let dispatch = self.dispatch.clone();
        self.run_inner().with_subscriber(dispatch).await
    }

    async fn run_inner(self) -> Result<Option<Resolution>> {
        let ShutdownSequence {
            config,
            host,
            registry,
            dispatch,
        } = self;

        if config.commands.is_empty() {
            debug!("no shutdown commands configured; nothing to do");
            return Ok(None);
        }

        info!(
            commands = config.commands.len(),
            timeout_ms = config.timeout.as_millis(),
            final_action = %config.final_action,
            "starting shutdown sequence"
        );

        let deadline = Instant::now() + config.timeout;
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let pending = PendingTracker::new();

        let selector = tokio::spawn(
            race_and_finish(
                done_rx,
                deadline,
                Arc::clone(&registry),
                host,
                config.final_action,
            )
            .with_subscriber(dispatch.clone()),
        );

        let runner = CommandRunner::new(registry, pending);
        let commands = config.commands;
        tokio::spawn(
            async move {
                dispatch_commands(&runner, &commands).await;
                debug!(
                    pending = runner.pending().pending(),
                    "all commands dispatched"
                );
                tokio::spawn(
                    watch_completion(runner.pending().clone(), done_tx)
                        .with_current_subscriber(),
                );
            }
            .with_subscriber(dispatch),
        );

        let resolution = selector
            .await
            .map_err(|e| KillcordError::Other(anyhow!("shutdown race task failed: {e}")))?;
        Ok(Some(resolution))
    }
}

/// Run every command in configured order. Sync commands block the loop;
/// async ones are released immediately.
async fn dispatch_commands(runner: &CommandRunner, commands: &[CommandSpec]) {
    for spec in commands {
        match spec.mode {
            ExecMode::Sync => {
                runner.run_sync(spec).await;
            }
            ExecMode::Async => {
                // The background task reports through the pending counter.
                let _ = runner.spawn_async(spec);
            }
        }
    }
}

/// Fire the completion signal once no async command is pending.
async fn watch_completion(pending: PendingTracker, done_tx: oneshot::Sender<()>) {
    pending.wait_idle().await;
    if done_tx.send(()).is_err() {
        debug!("completion observed after the shutdown race was decided");
    }
}

/// Wait for completion or the deadline, then perform the final action.
///
/// Only one `select!` branch can run, and nothing is awaited afterwards
/// except the final action itself.
async fn race_and_finish<H: HostControl + 'static>(
    mut done_rx: oneshot::Receiver<()>,
    deadline: Instant,
    registry: Arc<ProcessRegistry>,
    host: Arc<H>,
    final_action: FinalAction,
) -> Resolution {
    let resolution = tokio::select! {
        // A dropped sender (dispatch task panicked) disables this branch and
        // leaves the deadline in charge.
        Ok(()) = &mut done_rx => {
            info!("commands have finished");
            Resolution::Completed
        }
        () = sleep_until(deadline) => {
            warn!("timed out waiting for commands to finish");
            let killed = registry.kill_all();
            Resolution::TimedOut { killed }
        }
    };

    perform_final_action(host.as_ref(), final_action).await;
    resolution
}

async fn perform_final_action<H: HostControl + ?Sized>(host: &H, final_action: FinalAction) {
    match final_action {
        FinalAction::PowerOff => {
            info!("shutting down now");
            if let Err(err) = host.power_off().await {
                error!(error = %err, "error shutting down");
                host.abort(&err);
            }
        }
        FinalAction::Exit => {
            info!("exiting");
            host.exit_success();
        }
    }
}
