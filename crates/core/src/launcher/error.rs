//! Error types for the launcher module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when a downloader process cannot be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Downloader binary not found.
    #[error("Downloader not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// Downloader binary is not executable.
    #[error("Permission denied running downloader: {path}")]
    PermissionDenied { path: PathBuf },

    /// Output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The child was spawned without a captured pipe.
    #[error("Downloader {0} was not captured")]
    MissingPipe(&'static str),

    /// Any other I/O error while spawning.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaunchError {
    /// Maps a spawn error to the matching variant.
    pub fn from_spawn(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::EngineNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }
}
