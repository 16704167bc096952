//! Logging system setup and configuration
//!
//! This module handles the initialization of the tracing-based logging system
//! used throughout the engine for debugging, monitoring, and diagnostic output.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system
///
/// Sets up structured logging using the tracing crate with configurable
/// output format and filtering levels.
///
/// # Environment Variables
/// * `RUST_LOG` - Override the default logging filter (e.g., "debug", "prism_engine=trace")
pub fn setup_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    // Respect RUST_LOG when set, fall back to the requested level otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    Ok(())
}

/// Initialize logging with JSON format
///
/// Alternative logging setup that outputs structured JSON logs,
/// useful for log aggregation systems and machine parsing.
pub fn setup_logging_with_format(debug: bool, json_format: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}
