// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the configured shutdown
//! commands, using `tokio::process::Command`.
//!
//! - [`runner`] starts one command, inline (sync) or in the background (async).
//! - [`registry`] holds the kill handles of running async commands.
//! - [`pending`] counts async commands that have not exited yet.

pub mod pending;
pub mod registry;
pub mod runner;

pub use pending::{PendingGuard, PendingTracker};
pub use registry::{ProcessHandle, ProcessRegistry};
pub use runner::{CommandOutcome, CommandRunner};
