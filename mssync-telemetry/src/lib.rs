//! Tracing setup shared by the mssync binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set and defaults to `info`
/// otherwise. Safe to call once per process; later calls are ignored so
/// tests can share it.
pub fn init_tracing(app_name: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .try_init();

    if result.is_ok() {
        tracing::debug!(app_name, "tracing initialized");
    }
}
