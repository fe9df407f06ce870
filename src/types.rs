use std::fmt;
use serde::Deserialize;

/// How a configured command is run relative to the dispatch loop.
///
/// - `Sync`: the dispatch loop waits for the process to exit before moving
///   on to the next command (default).
/// - `Async`: the process is started and the loop continues immediately;
///   its exit is tracked by the pending counter and it can be killed when
///   the shutdown timeout fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    Sync,
    Async,
}

impl Default for ExecMode {
    fn default() -> Self {
        ExecMode::Sync
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Sync => f.write_str("sync"),
            ExecMode::Async => f.write_str("async"),
        }
    }
}

/// What happens once the shutdown sequence resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalAction {
    /// Invoke the platform power-off primitive.
    PowerOff,
    /// Terminate this process with a success status.
    Exit,
}

impl FinalAction {
    pub fn from_power_off_flag(power_off: bool) -> Self {
        if power_off {
            FinalAction::PowerOff
        } else {
            FinalAction::Exit
        }
    }
}

impl fmt::Display for FinalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalAction::PowerOff => f.write_str("power-off"),
            FinalAction::Exit => f.write_str("exit"),
        }
    }
}
