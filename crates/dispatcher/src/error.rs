//! Dispatcher error types

use contracts::{ContractError, TransportError};
use thiserror::Error;

/// Dispatcher-specific errors
///
/// All of these are construction-time: nothing raised at delivery time
/// comes back through this type.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A sink with this name is already registered
    #[error("sink '{name}' is already registered")]
    DuplicateSink { name: String },

    /// No sink with this name
    #[error("sink '{name}' is not registered")]
    UnknownSink { name: String },

    /// Delivery policy rejected at registration
    #[error("invalid policy for sink '{name}': {source}")]
    InvalidPolicy {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Transport setup failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
