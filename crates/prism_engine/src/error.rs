//! Error types for the Prism engine.
//!
//! The taxonomy mirrors how failures are handled at runtime: precondition
//! errors short-circuit an operation with a warning, transport errors abort
//! the current pass or tick without stopping the loops, consistency anomalies
//! drop the offending event, and missing capabilities disable a subsystem.

use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No active session; {0}")]
    NoActiveSession(&'static str),

    #[error("Transport error during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Analytics requires an observer pose source; analytics disabled")]
    MissingObserver,

    #[error("Polling intervals under 1 second are not supported")]
    PollingIntervalTooSmall,
}

/// Error returned by the transport capability.
///
/// The engine never inspects the payload beyond logging it; a faulted request
/// is reported and not retried.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl EngineError {
    /// Wraps a transport failure with the operation it interrupted.
    pub fn transport(operation: &'static str, source: TransportError) -> Self {
        Self::Transport { operation, source }
    }
}
