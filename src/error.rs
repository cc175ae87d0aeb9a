//! Error types for the Formguard service.
//!
//! Rate limit denials are not errors; they are ordinary [`Decision`] values.
//!
//! [`Decision`]: crate::ratelimit::Decision

use thiserror::Error;

/// Main error type for Formguard operations.
#[derive(Error, Debug)]
pub enum FormguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-side persisted state could not be written
    #[error("Storage error: {0}")]
    Storage(String),

    /// The notification collaborator failed to deliver a message
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Serve(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for FormguardError {
    fn from(e: config::ConfigError) -> Self {
        FormguardError::Config(e.to_string())
    }
}

/// Result type alias for Formguard operations.
pub type Result<T> = std::result::Result<T, FormguardError>;
