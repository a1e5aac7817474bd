//! Error types for the job module.

use thiserror::Error;

/// Errors reported synchronously by the job registry.
#[derive(Debug, Error)]
pub enum JobError {
    /// Missing or malformed identifier or options. No process was involved.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl JobError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}
