//! Lifecycle management for long lived resources.
//!
//! A [`LifecycleManager`] starts initializers concurrently as soon as they are
//! handed over, and queues close hooks until shutdown, when all of them run
//! concurrently. Failures and panics in either phase are logged and collected
//! instead of tearing the process down.

mod manager;
mod signal;

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

pub use manager::LifecycleManager;
pub use signal::wait_for_signal;

/// A resource that needs asynchronous setup, such as opening a pool.
#[async_trait]
pub trait Initializer: Send + Sync {
    /// Perform the setup.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// Name used in logs and failure reports.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// A resource that must be released gracefully on shutdown.
#[async_trait]
pub trait Closer: Send + Sync {
    /// Release the resource.
    async fn close(&self) -> anyhow::Result<()>;

    /// Name used in logs and failure reports.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// A resource with both a setup and a shutdown hook.
pub trait InitializerCloser: Initializer + Closer {}

impl<T: Initializer + Closer> InitializerCloser for T {}

/// A bare one-shot close hook.
pub type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Current phase of a [`LifecycleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting new initializers and closers.
    Running,
    /// Shutdown has begun; closers are running.
    Closing,
    /// Every closer has finished or been aborted.
    Closed,
}

/// Which hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// An `initialize` hook.
    Initialize,
    /// A `close` hook.
    Close,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::Close => f.write_str("close"),
        }
    }
}

/// A hook that returned an error, panicked or was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} of {name} failed: {reason}")]
pub struct LifecycleFailure {
    /// Hook that failed.
    pub phase: Phase,
    /// Name of the managed item.
    pub name: String,
    /// Error message or panic payload.
    pub reason: String,
}

/// Outcome of a shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Number of closers that were started.
    pub closers_run: usize,
    /// Closers that failed, panicked or were aborted.
    pub failures: Vec<LifecycleFailure>,
    /// Whether the shutdown deadline expired before every closer finished.
    pub timed_out: bool,
}

impl CloseReport {
    /// True when every closer finished successfully in time.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.timed_out
    }
}
