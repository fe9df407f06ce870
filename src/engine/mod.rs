// src/engine/mod.rs

//! Shutdown orchestration engine for killcord.
//!
//! - [`sequence`] races the configured commands against the timeout and
//!   performs the final action exactly once.
//! - [`host`] abstracts the final action's effects (power off, exit), with
//!   `SystemHost` as the production implementation.

/// How the shutdown race was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every command exited before the deadline.
    Completed,
    /// The deadline passed first; `killed` async processes were sent a kill.
    TimedOut { killed: usize },
}

pub mod host;
pub mod sequence;

pub use crate::types::FinalAction;
pub use host::{HostControl, SystemHost};
pub use sequence::ShutdownSequence;
