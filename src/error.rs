// src/error.rs

//! Unified error handling for the import pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed row, message body or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Object is not (or no longer) at the requested location
    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Object storage call failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Message channel call failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Catalog datastore call failed
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// Notification topic call failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more messages of a queue batch failed
    #[error("{failed} of {total} messages failed, first error: {first_error}")]
    Batch {
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// One or more objects of an upload event failed
    #[error("{failed} of {total} objects failed, first error: {first_error}")]
    Import {
        failed: usize,
        total: usize,
        first_error: String,
    },
}

impl AppError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an object-not-found error.
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create an object storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a message channel error.
    pub fn queue(message: impl fmt::Display) -> Self {
        Self::Queue(message.to_string())
    }

    /// Create a datastore error.
    pub fn datastore(message: impl fmt::Display) -> Self {
        Self::Datastore(message.to_string())
    }

    /// Create a notification error.
    pub fn notification(message: impl fmt::Display) -> Self {
        Self::Notification(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// External status code for this failure.
    ///
    /// Only the invocation boundary (Lambda responses, CLI exit) should
    /// call this.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::Csv(_) => 400,
            Self::ObjectNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Whether the failure is attributable to the caller's input.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
