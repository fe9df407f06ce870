use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use killcord::devices::{Device, DeviceSource};
use killcord::errors::{KillcordError, Result};

/// A device source that replays a script of enumeration results.
///
/// Each `enumerate` call pops the next entry; once the script is down to its
/// last entry, that entry is repeated forever.
#[derive(Debug)]
pub struct ScriptedDevices {
    script: Mutex<VecDeque<std::result::Result<Vec<Device>, String>>>,
    calls: AtomicUsize,
}

impl ScriptedDevices {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then_devices(self, devices: &[(&str, &str)]) -> Self {
        let list = devices
            .iter()
            .map(|(name, location)| Device::new(*name, *location))
            .collect();
        self.script.lock().unwrap().push_back(Ok(list));
        self
    }

    pub fn then_error(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSource for ScriptedDevices {
    fn enumerate(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Device>>> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().cloned()
                }
            };
            match next {
                Some(Ok(devices)) => Ok(devices),
                Some(Err(message)) => Err(KillcordError::InventoryTool(message)),
                None => Ok(Vec::new()),
            }
        })
    }
}
