//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected by the loader
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// The relay task went away mid-run
    #[error("Relay execution failed: {message}")]
    RelayExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn relay_execution(message: impl Into<String>) -> Self {
        Self::RelayExecution {
            message: message.into(),
        }
    }
}

/// Bail out early when the config path does not exist
pub fn ensure_config_exists(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::config_not_found(path))
    }
}
