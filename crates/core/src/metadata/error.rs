//! Error types for the metadata module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a metadata lookup.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The identifier is empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Downloader binary not found.
    #[error("Downloader not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// The downloader ran but reported a failure.
    #[error("Metadata lookup failed: {reason}")]
    LookupFailed { reason: String },

    /// The lookup did not finish in time.
    #[error("Metadata lookup timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The downloader output was not the expected JSON.
    #[error("Failed to parse metadata: {reason}")]
    ParseError { reason: String },

    /// I/O error while running the downloader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetadataError {
    pub fn lookup_failed(reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            reason: reason.into(),
        }
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// Whether the caller sent something unusable (as opposed to an upstream failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
