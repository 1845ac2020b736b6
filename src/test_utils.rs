//! Test logging helpers.
//!
//! Tests call [`init_test_logging`] first, then mark progress with
//! [`test_phase!`](crate::test_phase) and [`test_complete!`](crate::test_complete).
//! [`assert_with_log!`](crate::assert_with_log) logs expected and actual
//! values before asserting. Output goes through the test writer, so it is
//! only shown for failing tests; set `RUST_LOG` to change the level.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub use tracing as __tracing;

/// Installs a test-friendly `tracing` subscriber once per process.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(phase = %$name, "test phase");
    };
}

/// Logs test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(test = %$name, "test complete");
    };
}

/// Asserts `cond`, logging the expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let passed: bool = $cond;
        let expected = &$expected;
        let actual = &$actual;
        $crate::test_utils::__tracing::debug!(
            check = %$msg,
            expected = ?expected,
            actual = ?actual,
            passed,
            "assertion"
        );
        assert!(
            passed,
            "{}: expected {:?}, got {:?}",
            $msg, expected, actual
        );
    }};
}
