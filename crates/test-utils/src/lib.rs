pub mod builders;
pub mod capture;
pub mod fake_devices;
pub mod fake_host;

use std::sync::Once;
use std::time::Duration;

use killcord::logging::{log_filter, LOG_ENV_VAR};
use tracing_subscriber::fmt;

static INIT: Once = Once::new();

/// How long [`with_timeout`] lets a test future run.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the global test subscriber, filtered the same way the binary is.
///
/// `KILLCORD_LOG=killcord::exec=debug cargo test` shows child output and
/// registry activity for a failing test. Output goes through the test writer
/// so passing tests stay quiet.
///
/// Tests that assert on log lines use `capture::CapturedLogs` with
/// `ShutdownSequence::with_dispatch` instead; this subscriber only matters
/// for what a human sees.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env = std::env::var(LOG_ENV_VAR).ok();
        let filter = log_filter(None, env.as_deref())
            .unwrap_or_else(|e| panic!("bad {LOG_ENV_VAR} for tests: {e:#}"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_TIMEOUT:?}"))
}
