//! Logging infrastructure for Gluco.
//!
//! Provides centralized tracing setup for the `gluco` binary and for any
//! service that embeds `gluco_core`. Alert decisions are logged by the
//! core at these levels:
//!
//! - `debug`: every classifier and adherence evaluation
//! - `info`: stored records, emitted alerts, monitor run summaries
//! - `warn`: alerts skipped for lack of a physician, failed therapies,
//!   corrupt journal lines
//!
//! Output goes to stderr so command output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events follow the requested level
const GLUCO_TARGETS: &[&str] = &["gluco_core", "gluco"];

/// Initialize logging with sensible defaults
///
/// This sets up tracing with:
/// - Environment-based filtering (RUST_LOG)
/// - Gluco's own events at INFO, dependencies at WARN
/// - Compact format on stderr
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Level for Gluco's own events (debug, info, warn, error)
///
/// RUST_LOG, when set, replaces the default directives entirely.
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Filter directives: dependencies at `warn`, Gluco targets at `level`
fn default_directives(level: &str) -> String {
    GLUCO_TARGETS
        .iter()
        .fold(String::from("warn"), |mut directives, target| {
            directives.push_str(&format!(",{}={}", target, level));
            directives
        })
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(default_directives("debug")))
        .try_init();
}
