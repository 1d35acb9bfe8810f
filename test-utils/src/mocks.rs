//! Mock implementations for testing.
//!
//! [`MockResource`] stands in for a database pool, queue client or any other
//! managed connection. It records every hook invocation in a shared
//! [`EventLog`] and can be told to delay, fail or panic in either phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use service_common::{Closer, Initializer, InitializerCloser, Phase};
use tokio::time::Instant;

/// How a mocked hook ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Return `Ok(())`.
    #[default]
    Succeed,
    /// Return an error.
    Fail,
    /// Panic.
    Panic,
}

/// A recorded hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookEvent {
    /// Resource name
    pub name: String,
    /// Hook that finished
    pub phase: Phase,
    /// When the hook finished
    pub at: Instant,
}

/// Shared, ordered record of hook completions.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str, phase: Phase) {
        self.events.lock().push(HookEvent {
            name: name.to_string(),
            phase,
            at: Instant::now(),
        });
    }

    /// All recorded events in completion order.
    #[must_use]
    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().clone()
    }

    /// Names of resources whose `phase` hook completed, in order.
    #[must_use]
    pub fn names(&self, phase: Phase) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct HookBehavior {
    delay: Duration,
    outcome: Outcome,
}

/// Mock managed resource.
#[derive(Debug)]
pub struct MockResource {
    name: String,
    init: HookBehavior,
    close: HookBehavior,
    log: EventLog,
    init_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl MockResource {
    /// Create a resource that succeeds immediately in both phases.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            init: HookBehavior::default(),
            close: HookBehavior::default(),
            log: log.clone(),
            init_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before initialization completes.
    #[must_use]
    pub const fn init_delay(mut self, delay: Duration) -> Self {
        self.init.delay = delay;
        self
    }

    /// Sleep for `delay` before close completes.
    #[must_use]
    pub const fn close_delay(mut self, delay: Duration) -> Self {
        self.close.delay = delay;
        self
    }

    /// Set how initialization ends.
    #[must_use]
    pub const fn init_outcome(mut self, outcome: Outcome) -> Self {
        self.init.outcome = outcome;
        self
    }

    /// Set how close ends.
    #[must_use]
    pub const fn close_outcome(mut self, outcome: Outcome) -> Self {
        self.close.outcome = outcome;
        self
    }

    /// Number of times `initialize` was entered.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of times `close` was entered.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Wrap for [`service_common::LifecycleManager::manage_initialization`].
    #[must_use]
    pub fn initializer(self: &Arc<Self>) -> Arc<dyn Initializer> {
        Arc::clone(self) as Arc<dyn Initializer>
    }

    /// Wrap for [`service_common::LifecycleManager::manage_close`].
    #[must_use]
    pub fn closer(self: &Arc<Self>) -> Arc<dyn Closer> {
        Arc::clone(self) as Arc<dyn Closer>
    }

    /// Wrap for [`service_common::LifecycleManager::manage_lifecycle`].
    #[must_use]
    pub fn lifecycle(self: &Arc<Self>) -> Arc<dyn InitializerCloser> {
        Arc::clone(self) as Arc<dyn InitializerCloser>
    }

    async fn run(&self, phase: Phase, behavior: HookBehavior) -> anyhow::Result<()> {
        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }
        match behavior.outcome {
            Outcome::Succeed => {
                self.log.record(&self.name, phase);
                Ok(())
            }
            Outcome::Fail => {
                self.log.record(&self.name, phase);
                anyhow::bail!("{} failed to {phase}", self.name)
            }
            Outcome::Panic => panic!("{} panicked during {phase}", self.name),
        }
    }
}

#[async_trait]
impl Initializer for MockResource {
    async fn initialize(&self) -> anyhow::Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.run(Phase::Initialize, self.init).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl Closer for MockResource {
    async fn close(&self) -> anyhow::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.run(Phase::Close, self.close).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Readiness check that reports ready after a fixed number of failed checks.
#[derive(Debug, Clone)]
pub struct FlakyCheck {
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FlakyCheck {
    /// Check that fails `failures` times before succeeding.
    #[must_use]
    pub fn new(failures: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run one readiness check.
    pub async fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_err()
    }

    /// Number of checks performed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
