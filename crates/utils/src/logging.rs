//! Logging configuration for idb components
//!
//! Provides centralized logging setup with:
//! - Console output with structured formatting
//! - Environment variable support (RUST_LOG)
//! - Default INFO level
//!
//! The debug runtime deliberately does not route its protocol-mandated
//! stderr lines through here: an instrumented program may have no
//! subscriber installed. This module serves the CLI, the engine, and tests.

use eyre::Result;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for an idb component
///
/// Sets up a console subscriber with timestamps and targets, honoring the
/// `RUST_LOG` environment variable and defaulting to INFO.
///
/// # Arguments
/// * `component_name` - Name of the component (e.g., "idb")
pub fn init_logging(component_name: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::debug!(component = component_name, "Logging initialized");

    Ok(())
}

/// Initialize simple logging at an explicit level (console only)
pub fn init_simple_logging(level: Level) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level.as_str()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize simple logging: {}", e))?;

    Ok(())
}

// Global test logging initialization - ensures logging is only set up once across all tests
static TEST_LOGGING_INIT: Once = Once::new();

/// Safe logging initialization for tests - can be called multiple times without crashing
///
/// Uses `std::sync::Once` so initialization happens only once per test
/// process; later calls (and calls racing an already-installed subscriber)
/// are no-ops.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let default_level = default_level.unwrap_or(Level::INFO);
        // If a subscriber is already installed, that's fine for tests.
        let _ = init_simple_logging(default_level);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_logging_functions_work() {
        ensure_test_logging(None);

        info!("Test info message");
        warn!("Test warning message");
        debug!("Test debug message");
        error!("Test error message");
    }

    #[test]
    fn test_double_initialization_is_safe() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));

        // Later init attempts must fail gracefully, not panic.
        let result = init_logging("idb-test");
        let _ = result;

        info!("Logging still works after repeated init attempts");
    }
}
