//! Shared library for cross-cutting concerns in backend services.
//!
//! This crate provides centralized implementations for:
//! - Lifecycle management of long lived connections
//! - Error types with retryability classification
//! - Retry policies and readiness polling with exponential backoff
//! - Environment variable parsing and service configuration
//! - Structured logging setup
//! - Content hashing and base64url validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod hashing;
pub mod lifecycle;
pub mod logging;
pub mod retry;
pub mod validation;

pub use config::ServiceConfig;
pub use env::{EnvReader, EnvSource};
pub use error::{Result, ServiceError};
pub use hashing::{hash_and_encode, hash_and_encode_bytes};
pub use lifecycle::{
    CloseReport, Closer, Initializer, InitializerCloser, LifecycleFailure, LifecycleManager,
    LifecycleState, Phase,
};
pub use logging::{LogLevel, LogOutput, LoggingConfig, LoggingHandle, init_logging};
pub use retry::{RetryConfig, RetryPolicy, await_interval, await_ready};
pub use validation::{KeyType, check_dotted, is_valid_base64_url, is_valid_key};
