//! Diagnostic tracing for scenario runs.
//!
//! Reads `RUST_LOG`; defaults to `warn`. Output goes to stderr in compact
//! format so stdout stays free for reports.
//!
//! ```bash
//! RUST_LOG=engine=debug matrix run suites/history_marker.toml
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Call once, from `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
