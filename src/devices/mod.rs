// src/devices/mod.rs

//! Device enumeration.
//!
//! Stateless: every call re-reads the inventory. Errors are returned to the
//! caller rather than swallowed, since a failed read says nothing about
//! which devices are present.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

pub mod parse;
pub mod system_profiler;

pub use parse::parse_device_list;
pub use system_profiler::SystemProfiler;

/// One enumerated device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub name: String,
    pub location: String,
}

impl Device {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location)
    }
}

/// Trait abstracting where the device list comes from.
///
/// Production code uses [`SystemProfiler`]; tests provide scripted lists.
pub trait DeviceSource: Send + Sync {
    fn enumerate(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Device>>> + Send + '_>>;
}
