//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A producer or consumer task failed
    #[error("Replay failed: {message}")]
    Replay { message: String },

    /// Replay did not finish in time
    #[error("Replay timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn replay(message: impl Into<String>) -> Self {
        Self::Replay {
            message: message.into(),
        }
    }
}
