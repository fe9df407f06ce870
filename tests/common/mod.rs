#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub use killcord_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Path of a marker file inside `dir`, plus the same path quoted for use in
/// `sh -c` scripts.
pub fn marker(dir: &Path, name: &str) -> (PathBuf, String) {
    let path = dir.join(name);
    let quoted = format!("'{}'", path.display());
    (path, quoted)
}

/// Pid written by a `echo $$ > file` script, once the file is complete.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Scheduler state letter from `/proc/<pid>/stat`, or `None` once the
/// process is gone entirely.
#[cfg(target_os = "linux")]
pub fn proc_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    stat.rsplit_once(')')?.1.trim_start().chars().next()
}

/// Block the current thread until `pid` has died (zombie or reaped), for at
/// most `limit`. Never yields to the async runtime.
#[cfg(target_os = "linux")]
pub fn block_until_dead(pid: u32, limit: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + limit;
    loop {
        if matches!(proc_state(pid), None | Some('Z') | Some('X')) {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
