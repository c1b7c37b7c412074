//! Layered error definitions
//!
//! Categorized by source: config / transport / observer

use thiserror::Error;

/// Configuration and general contract errors
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A sink failed to transmit a record.
///
/// Only ever reported on the sink's own result channel, never back into
/// the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the remote endpoint
    #[error("sink '{sink_name}' connection error: {message}")]
    Connection { sink_name: String, message: String },

    /// Record could not be encoded for the wire
    #[error("sink '{sink_name}' encode error: {message}")]
    Encode { sink_name: String, message: String },

    /// Write/send failed mid-flight
    #[error("sink '{sink_name}' send error: {message}")]
    Send { sink_name: String, message: String },

    /// Remote endpoint answered with a non-success status
    #[error("sink '{sink_name}' rejected record with status {status}")]
    Rejected { sink_name: String, status: u16 },

    /// Sink was already closed
    #[error("sink '{sink_name}' is closed")]
    Closed { sink_name: String },
}

impl TransportError {
    /// Create send error
    pub fn send(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create connection error
    pub fn connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// An observer callback failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObserverError {
    /// Callback returned an error
    #[error("observer '{observer}' failed: {message}")]
    Callback { observer: String, message: String },

    /// Callback panicked
    #[error("observer '{observer}' panicked: {message}")]
    Panicked { observer: String, message: String },
}

impl ObserverError {
    /// Create callback error
    pub fn callback(observer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Callback {
            observer: observer.into(),
            message: message.into(),
        }
    }
}
