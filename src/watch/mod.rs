// src/watch/mod.rs

//! Device-removal detection.
//!
//! This module polls the device inventory and turns "a watched device is
//! gone" into a single trigger for the shutdown sequence. It does **not**
//! know about the sequence itself; the caller decides what to run.

pub mod monitor;

pub use monitor::{removed_devices, DeviceMonitor};
