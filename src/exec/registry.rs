// src/exec/registry.rs

//! Registry of live asynchronous child processes.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info};

/// Handle to a started OS process that the registry can terminate.
///
/// The runner task that spawned the process keeps the `Child` and listens on
/// the other half of `kill`. Once the runner task has finished (process
/// reaped) the receiver is gone and the handle counts as dead.
///
/// On unix, `kill_all` signals the pid directly, so the process is gone even
/// if the runner task never gets polled again; the message on `kill` then
/// only tells the runner to reap it.
pub struct ProcessHandle {
    label: String,
    pid: Option<u32>,
    kill: oneshot::Sender<()>,
}

impl ProcessHandle {
    pub fn new(label: impl Into<String>, pid: Option<u32>, kill: oneshot::Sender<()>) -> Self {
        Self {
            label: label.into(),
            pid,
            kill,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process is still being supervised by its runner task.
    pub fn is_alive(&self) -> bool {
        !self.kill.is_closed()
    }

    /// Kill the process now and tell its runner task to reap it.
    ///
    /// Returns `false` if the runner already finished, in which case nothing
    /// is signalled.
    fn terminate(self) -> bool {
        if !self.is_alive() {
            return false;
        }
        if let Some(pid) = self.pid {
            if let Err(e) = signal_kill(pid) {
                debug!(cmd = %self.label, pid, error = %e, "failed to signal process");
            }
        }
        self.kill.send(()).is_ok()
    }
}

#[cfg(unix)]
fn signal_kill(pid: u32) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("pid {pid} out of range"))
    })?;
    kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(std::io::Error::from)
}

// Off unix the runner task does the killing when it receives the request.
#[cfg(not(unix))]
fn signal_kill(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Ordered, mutex-guarded collection of [`ProcessHandle`]s.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    handles: Mutex<Vec<ProcessHandle>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: ProcessHandle) {
        debug!(cmd = %handle.label, pid = ?handle.pid, "registering process");
        self.lock().push(handle);
    }

    /// Kill every still-running process, then clear the registry.
    ///
    /// The kill signal is sent before this returns; reaping is left to each
    /// process's runner task, so this never waits for an exit. A process
    /// that already went away is skipped silently. Returns the number of
    /// processes that were killed.
    pub fn kill_all(&self) -> usize {
        let mut guard = self.lock();
        let handles = std::mem::take(&mut *guard);
        let total = handles.len();

        let mut killed = 0;
        for handle in handles {
            let label = handle.label.clone();
            let pid = handle.pid;
            if handle.terminate() {
                info!(cmd = %label, pid = ?pid, "killing process");
                killed += 1;
            } else {
                debug!(cmd = %label, pid = ?pid, "process exited before it could be killed");
            }
        }

        debug!(registered = total, killed, "registry cleared");
        killed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProcessHandle>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
