//! Pipeline error types

use dispatcher::DispatcherError;
use thiserror::Error;

/// Pipeline errors
///
/// Parse, transport and observer failures never show up here; they are
/// handled inside the cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sink registration / removal failed
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    /// The pipeline task is gone
    #[error("pipeline is not running")]
    Closed,
}

/// Pipeline Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
