// tests/shutdown_sequence.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, marker, with_timeout, TestResult};
#[cfg(target_os = "linux")]
use crate::common::{block_until_dead, read_pid_file};

#[cfg(target_os = "linux")]
use std::future::Future;
#[cfg(target_os = "linux")]
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::Level;

#[cfg(target_os = "linux")]
use killcord::engine::HostControl;
use killcord::engine::{Resolution, ShutdownSequence};
#[cfg(target_os = "linux")]
use killcord::errors::KillcordError;
use killcord_test_utils::builders::ShutdownConfigBuilder;
use killcord_test_utils::capture::CapturedLogs;
use killcord_test_utils::fake_host::RecordingHost;

#[tokio::test]
async fn sync_only_commands_complete_without_registering_handles() -> TestResult {
    init_tracing();

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("true")
        .line("true")
        .build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host));
    let registry = sequence.registry();

    let resolution = with_timeout(sequence.run()).await?;

    assert_eq!(resolution, Some(Resolution::Completed));
    assert!(registry.is_empty(), "sync commands must never be registered");
    assert_eq!(host.exits(), 1);
    assert_eq!(host.power_offs(), 0);
    Ok(())
}

#[tokio::test]
async fn timeout_with_only_sync_commands_kills_nothing() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (done_path, done) = marker(dir.path(), "sync-finished");

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(100)
        .sync_sh(&format!("sleep 0.6; touch {done}"))
        .build();
    let host = Arc::new(RecordingHost::new());

    let resolution = with_timeout(ShutdownSequence::new(cfg, Arc::clone(&host)).run()).await?;

    assert_eq!(resolution, Some(Resolution::TimedOut { killed: 0 }));
    assert_eq!(host.final_actions(), 1);

    // The final action did not wait for the slow sync command...
    assert!(!done_path.exists());
    // ...and did not kill it either.
    sleep(Duration::from_millis(1_500)).await;
    assert!(done_path.exists(), "sync command should have run to completion");
    assert_eq!(host.final_actions(), 1, "late completion must not re-run the final action");
    Ok(())
}

#[tokio::test]
async fn async_command_outliving_timeout_is_killed() -> TestResult {
    init_tracing();

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(200)
        .line("!sleep 10")
        .build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host));
    let registry = sequence.registry();

    let started = Instant::now();
    let resolution = with_timeout(sequence.run()).await?;

    assert_eq!(resolution, Some(Resolution::TimedOut { killed: 1 }));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(registry.is_empty(), "kill_all clears the registry");
    assert_eq!(host.exits(), 1);
    assert_eq!(host.final_actions(), 1);
    Ok(())
}

/// Host that checks, from inside `exit_success`, whether the command whose
/// pid is in `pid_file` is already dead. It blocks the calling thread, so
/// nothing else on that worker runs in the meantime.
#[cfg(target_os = "linux")]
struct ExitTimeLivenessHost {
    pid_file: std::path::PathBuf,
    dead_at_exit: std::sync::Mutex<Option<bool>>,
}

#[cfg(target_os = "linux")]
impl HostControl for ExitTimeLivenessHost {
    fn power_off(&self) -> Pin<Box<dyn Future<Output = killcord::errors::Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn exit_success(&self) {
        let dead = read_pid_file(&self.pid_file)
            .is_some_and(|pid| block_until_dead(pid, Duration::from_millis(500)));
        *self.dead_at_exit.lock().unwrap() = Some(dead);
    }

    fn abort(&self, _error: &KillcordError) {}
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn timed_out_async_command_is_dead_before_final_action() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (pid_path, pid_file) = marker(dir.path(), "pid");

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(300)
        .async_sh(&format!("echo $$ > {pid_file}; exec sleep 30"))
        .build();
    let host = Arc::new(ExitTimeLivenessHost {
        pid_file: pid_path,
        dead_at_exit: std::sync::Mutex::new(None),
    });

    let resolution = with_timeout(ShutdownSequence::new(cfg, Arc::clone(&host)).run()).await?;

    assert_eq!(resolution, Some(Resolution::TimedOut { killed: 1 }));
    assert_eq!(
        *host.dead_at_exit.lock().unwrap(),
        Some(true),
        "async command must be killed before the process exits"
    );
    Ok(())
}

#[tokio::test]
async fn generous_timeout_completes_without_kill_all() -> TestResult {
    init_tracing();

    let logs = CapturedLogs::new();
    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("!sleep 0.2")
        .line("true")
        .async_sh("exit 0")
        .build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host)).with_dispatch(logs.dispatch());
    let registry = sequence.registry();

    let resolution = with_timeout(sequence.run()).await?;

    assert_eq!(resolution, Some(Resolution::Completed));
    assert!(logs.contains("commands have finished"));
    assert!(!logs.contains("timed out waiting for commands to finish"));
    assert!(!logs.contains("killing process"));
    // Never cleared: kill_all did not run.
    assert_eq!(registry.len(), 2);
    assert_eq!(host.exits(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_command_list_does_nothing() -> TestResult {
    init_tracing();

    let logs = CapturedLogs::new();
    let cfg = ShutdownConfigBuilder::new().timeout_ms(10).power_off().build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host)).with_dispatch(logs.dispatch());
    let registry = sequence.registry();

    let resolution = with_timeout(sequence.run()).await?;
    sleep(Duration::from_millis(50)).await;

    assert_eq!(resolution, None);
    assert_eq!(host.final_actions(), 0);
    assert!(registry.is_empty());
    assert!(!logs.contains("starting shutdown sequence"));
    assert!(!logs.contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn power_off_runs_instead_of_exit() -> TestResult {
    init_tracing();

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("true")
        .power_off()
        .build();
    let host = Arc::new(RecordingHost::new());

    let resolution = with_timeout(ShutdownSequence::new(cfg, Arc::clone(&host)).run()).await?;

    assert_eq!(resolution, Some(Resolution::Completed));
    assert_eq!(host.power_offs(), 1);
    assert_eq!(host.exits(), 0);
    assert!(host.aborts().is_empty());
    Ok(())
}

#[tokio::test]
async fn power_off_failure_is_fatal() -> TestResult {
    init_tracing();

    let logs = CapturedLogs::new();
    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("true")
        .power_off()
        .build();
    let host = Arc::new(RecordingHost::failing_power_off());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host)).with_dispatch(logs.dispatch());

    with_timeout(sequence.run()).await?;

    assert_eq!(host.power_offs(), 1);
    assert_eq!(host.exits(), 0, "a failed power-off must not fall back to a clean exit");
    let aborts = host.aborts();
    assert_eq!(aborts.len(), 1);
    assert!(aborts[0].contains("simulated failure"));
    assert!(logs.contains_at(Level::ERROR, "error shutting down"));
    Ok(())
}

#[tokio::test]
async fn failing_commands_do_not_stop_the_sequence() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (reached_path, reached) = marker(dir.path(), "reached");
    let logs = CapturedLogs::new();

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("false")
        .line("/nonexistent/killcord-missing-program")
        .line("!/nonexistent/killcord-missing-parallel")
        .async_sh("exit 3")
        .sync_sh(&format!("touch {reached}"))
        .build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, Arc::clone(&host)).with_dispatch(logs.dispatch());

    let resolution = with_timeout(sequence.run()).await?;

    assert_eq!(resolution, Some(Resolution::Completed));
    assert!(reached_path.exists(), "commands after failures still run");
    assert!(logs.contains("error while running command"));
    assert!(logs.contains("error starting parallel command"));
    assert!(logs.contains("command exited unsuccessfully"));
    assert_eq!(host.exits(), 1);
    Ok(())
}

#[tokio::test]
async fn sync_commands_run_in_configured_order() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (log_path, log) = marker(dir.path(), "order.log");

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .sync_sh(&format!("sleep 0.1; echo one >> {log}"))
        .sync_sh(&format!("echo two >> {log}"))
        .sync_sh(&format!("echo three >> {log}"))
        .build();
    let host = Arc::new(RecordingHost::new());

    with_timeout(ShutdownSequence::new(cfg, host).run()).await?;

    assert_eq!(std::fs::read_to_string(log_path)?, "one\ntwo\nthree\n");
    Ok(())
}

#[tokio::test]
async fn async_commands_do_not_block_dispatch() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let (after_path, after) = marker(dir.path(), "after-async");

    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(5_000)
        .line("!sleep 1")
        .sync_sh(&format!("touch {after}"))
        .build();
    let host = Arc::new(RecordingHost::new());

    let run = tokio::spawn(ShutdownSequence::new(cfg, Arc::clone(&host)).run());

    sleep(Duration::from_millis(400)).await;
    assert!(after_path.exists(), "sync command should start while the async one runs");
    assert!(!run.is_finished(), "completion must wait for the async command");
    assert_eq!(host.final_actions(), 0);

    let resolution = with_timeout(run).await??;
    assert_eq!(resolution, Some(Resolution::Completed));
    assert_eq!(host.final_actions(), 1);
    Ok(())
}

#[tokio::test]
async fn final_action_runs_exactly_once_when_racing() -> TestResult {
    init_tracing();

    // Timeout and command runtime coincide, so either branch may win.
    for _ in 0..10 {
        let cfg = ShutdownConfigBuilder::new()
            .timeout_ms(100)
            .line("!sleep 0.1")
            .line("!sleep 0.1")
            .build();
        let host = Arc::new(RecordingHost::new());

        let resolution = with_timeout(ShutdownSequence::new(cfg, Arc::clone(&host)).run()).await?;
        assert!(matches!(
            resolution,
            Some(Resolution::Completed) | Some(Resolution::TimedOut { .. })
        ));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(host.final_actions(), 1);
    }
    Ok(())
}

#[tokio::test]
async fn timeout_path_is_logged_through_injected_dispatch() -> TestResult {
    init_tracing();

    let logs = CapturedLogs::new();
    let cfg = ShutdownConfigBuilder::new()
        .timeout_ms(100)
        .line("!sleep 10")
        .build();
    let host = Arc::new(RecordingHost::new());
    let sequence = ShutdownSequence::new(cfg, host).with_dispatch(logs.dispatch());

    with_timeout(sequence.run()).await?;

    assert!(logs.contains_at(Level::WARN, "timed out waiting for commands to finish"));
    assert_eq!(logs.count("killing process"), 1);
    assert!(logs.contains("starting shutdown sequence"));
    assert!(!logs.contains("commands have finished"));
    Ok(())
}
