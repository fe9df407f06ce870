// src/devices/parse.rs

//! Parser for `system_profiler SPUSBDataType` text output.

use std::sync::LazyLock;

use regex::Regex;

use super::Device;

static DEVICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*):$").expect("device name pattern is valid"));

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Location ID: (.*)$").expect("location pattern is valid"));

/// Turn inventory output into device records, in encounter order.
///
/// Lines are trimmed of spaces. A line ending in `:` names the pending
/// device (later names overwrite earlier ones, which skips bus and section
/// headers). A `Location ID: <id>` line emits `(pending name, id)` if a name
/// is pending and clears the pending name either way.
pub fn parse_device_list(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();
    let mut pending_name: Option<String> = None;

    for raw in output.lines() {
        let line = raw.trim_matches(' ');

        if let Some(caps) = LOCATION_RE.captures(line) {
            if let (Some(name), Some(location)) = (pending_name.take(), caps.get(1)) {
                devices.push(Device::new(name, location.as_str()));
            }
        } else if let Some(caps) = DEVICE_RE.captures(line) {
            pending_name = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|name| !name.is_empty());
        }
    }

    devices
}
