//! Error types for the acquisition and matting pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, WatchshotError>;

/// Error taxonomy for the two pipeline stages
///
/// Only `Configuration` is fatal; every other variant is recovered at the
/// narrowest scope (candidate, item, or file) so a single failure never
/// aborts a batch.
#[derive(Error, Debug)]
pub enum WatchshotError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or placeholder API key, unusable directories
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Search request or markup extraction failure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Candidate download or write-stream failure
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Vision classifier call failure or malformed response
    #[error("Classification error: {0}")]
    Classification(String),

    /// Background-removal call failure
    #[error("Matting error: {0}")]
    Matting(String),
}

impl WatchshotError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new discovery error
    pub fn discovery<S: Into<String>>(msg: S) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a new transfer error
    pub fn transfer<S: Into<String>>(msg: S) -> Self {
        Self::Transfer(msg.into())
    }

    /// Create a new classification error
    pub fn classification<S: Into<String>>(msg: S) -> Self {
        Self::Classification(msg.into())
    }

    /// Create a new matting error
    pub fn matting<S: Into<String>>(msg: S) -> Self {
        Self::Matting(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create a transfer error with URL context
    pub fn transfer_for_url(operation: &str, url: &str, error: &dyn std::fmt::Display) -> Self {
        Self::Transfer(format!("Failed to {} '{}': {}", operation, url, error))
    }
}
