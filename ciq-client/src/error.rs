//! Error types for the ciq client

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to a CI server
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Body returned by the server
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Runner id missing from the registry
    #[error("runner '{0}' does not exist, use the 'runner add' command")]
    UnknownRunner(String),

    /// Runner settings that cannot be used
    #[error("Invalid runner configuration: {0}")]
    InvalidConfig(String),

    /// Cache file operation failed
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A limiter semaphore was closed
    #[error("I/O limiter closed")]
    LimiterClosed(#[from] tokio::sync::AcquireError),

    /// Build trigger did not start the job
    #[error("job {job} start failed: {message}")]
    StartFailed { job: String, message: String },
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn start_failed(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StartFailed {
            job: job.into(),
            message: message.into(),
        }
    }
}
