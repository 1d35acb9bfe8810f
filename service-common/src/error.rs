//! Centralized error type for the shared service library.
//!
//! Every fallible operation in this crate returns [`ServiceError`], which
//! classifies failures as retryable or not so callers can decide whether
//! polling again makes sense.

use std::time::Duration;
use thiserror::Error;

/// Common error type for service utility operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A required environment variable is not set
    #[error("Environment variable {name} is not set")]
    MissingEnv {
        /// Name of the missing variable
        name: String,
    },

    /// An environment variable is set but cannot be parsed
    #[error("Environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidEnv {
        /// Name of the variable
        name: String,
        /// Raw value that failed to parse
        value: String,
        /// Parser error description
        reason: String,
    },

    /// An environment variable parsed to zero where zero is not allowed
    #[error("Environment variable {name} must not be zero")]
    ZeroEnv {
        /// Name of the variable
        name: String,
    },

    /// The lifecycle manager is shutting down and no longer accepts work
    #[error("Lifecycle manager is shutting down")]
    ShuttingDown,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A dependency is temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O failure (log files, signal handlers)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialized
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use service_common::ServiceError;
    /// use std::time::Duration;
    ///
    /// assert!(ServiceError::Timeout(Duration::from_secs(1)).is_retryable());
    /// assert!(!ServiceError::ShuttingDown.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// Create a missing environment variable error.
    #[must_use]
    pub fn missing_env(name: impl Into<String>) -> Self {
        Self::MissingEnv { name: name.into() }
    }

    /// Create an invalid environment variable error.
    #[must_use]
    pub fn invalid_env(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid configuration error with the given message.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
