//! Diagnostic log sink
//!
//! The harness only emits `tracing` events. [`init`] installs a formatting
//! subscriber for test binaries; failing to install one never fails a test.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Install a test-friendly subscriber, once per process
///
/// Later calls, or calls after another subscriber was installed, are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .try_init();
}
