use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use killcord::engine::HostControl;
use killcord::errors::{KillcordError, Result};

/// A fake host that:
/// - records every final-action call instead of exiting or powering off
/// - optionally fails `power_off` to exercise the fatal path.
#[derive(Debug, Default)]
pub struct RecordingHost {
    power_offs: AtomicUsize,
    exits: AtomicUsize,
    aborts: Mutex<Vec<String>>,
    fail_power_off: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose power-off primitive always fails.
    pub fn failing_power_off() -> Self {
        Self {
            fail_power_off: true,
            ..Self::default()
        }
    }

    pub fn power_offs(&self) -> usize {
        self.power_offs.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> Vec<String> {
        self.aborts.lock().unwrap().clone()
    }

    /// Total number of terminal calls (power off, exit, abort).
    pub fn final_actions(&self) -> usize {
        self.power_offs() + self.exits() + self.aborts().len()
    }
}

impl HostControl for RecordingHost {
    fn power_off(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.power_offs.fetch_add(1, Ordering::SeqCst);
            if self.fail_power_off {
                return Err(KillcordError::PowerOff("simulated failure".to_string()));
            }
            Ok(())
        })
    }

    fn exit_success(&self) {
        self.exits.fetch_add(1, Ordering::SeqCst);
    }

    fn abort(&self, error: &KillcordError) {
        self.aborts.lock().unwrap().push(error.to_string());
    }
}
