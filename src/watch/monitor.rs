// src/watch/monitor.rs

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::MonitorSection;
use crate::devices::{Device, DeviceSource};
use crate::errors::{KillcordError, Result};

/// Polls a [`DeviceSource`] and reports when a watched device disappears.
///
/// The watched set is the device list at startup, optionally narrowed to
/// the configured location IDs.
pub struct DeviceMonitor<S: DeviceSource> {
    source: S,
    poll_interval: Duration,
    locations: Vec<String>,
}

impl<S: DeviceSource> std::fmt::Debug for DeviceMonitor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("locations", &self.locations)
            .finish_non_exhaustive()
    }
}

impl<S: DeviceSource> DeviceMonitor<S> {
    pub fn new(source: S, section: &MonitorSection) -> Self {
        Self::with_interval(source, section.poll_interval(), section.devices.clone())
    }

    pub fn with_interval(source: S, poll_interval: Duration, locations: Vec<String>) -> Self {
        Self {
            source,
            poll_interval,
            locations,
        }
    }

    /// Enumerate once and keep the devices this monitor should watch.
    ///
    /// Errors if enumeration fails or nothing matches, since a monitor with
    /// nothing to watch could never fire.
    pub async fn baseline(&self) -> Result<Vec<Device>> {
        let present = self.source.enumerate().await?;
        let watched: Vec<Device> = present
            .into_iter()
            .filter(|d| self.locations.is_empty() || self.locations.contains(&d.location))
            .collect();

        if watched.is_empty() {
            return Err(KillcordError::ConfigError(if self.locations.is_empty() {
                "no devices present at startup; nothing to watch".to_string()
            } else {
                format!(
                    "none of the configured devices {:?} are present at startup",
                    self.locations
                )
            }));
        }

        Ok(watched)
    }

    /// Take a baseline, then poll until at least one watched device is gone.
    /// Returns the removed devices.
    ///
    /// A failed poll is logged and skipped; only the baseline read is fatal.
    pub async fn wait_for_removal(&self) -> Result<Vec<Device>> {
        let watched = self.baseline().await?;
        for device in &watched {
            info!(name = %device.name, location = %device.location, "watching device");
        }

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the baseline was just taken.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let current = match self.source.enumerate().await {
                Ok(current) => current,
                Err(err) => {
                    warn!(error = %err, "device enumeration failed; skipping this poll");
                    continue;
                }
            };

            let removed = removed_devices(&watched, &current);
            if removed.is_empty() {
                debug!(present = current.len(), "all watched devices present");
                continue;
            }

            for device in &removed {
                warn!(name = %device.name, location = %device.location, "device removed");
            }
            return Ok(removed);
        }
    }
}

/// Watched devices that are missing from `current`, in watched order.
pub fn removed_devices(watched: &[Device], current: &[Device]) -> Vec<Device> {
    watched
        .iter()
        .filter(|d| !current.contains(d))
        .cloned()
        .collect()
}
