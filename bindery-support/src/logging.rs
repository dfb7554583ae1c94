//! `tracing` subscriber setup.
//!
//! The container crates only emit events; applications and tests decide
//! where they go. These helpers install a `fmt` subscriber filtered by
//! `RUST_LOG`, falling back to a default directive.
//!
//! ```rust,no_run
//! bindery_support::logging::init("bindery_container=debug");
//! ```

use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber is already installed.
#[derive(Debug, thiserror::Error)]
#[error("Failed to install tracing subscriber: {0}")]
pub struct LoggingError(String);

fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs the global subscriber.
///
/// # Panics
/// Panics if a global subscriber was already set. Use [`try_init`] in
/// code that may run more than once (tests).
pub fn init(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .init();
    tracing::debug!(default_directive, "Logging initialized");
}

/// Installs the global subscriber, reporting instead of panicking when
/// one is already set. Output goes to stdout, as with [`init`].
pub fn try_init(default_directive: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))?;
    tracing::debug!(default_directive, "Logging initialized");
    Ok(())
}

/// Like [`try_init`], but writes through the test harness so output is
/// captured per test.
pub fn try_init_for_tests(default_directive: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .with_target(true)
        .with_test_writer()
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))?;
    tracing::debug!(default_directive, "Test logging initialized");
    Ok(())
}
