use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    CloseFn, CloseReport, Closer, Initializer, InitializerCloser, LifecycleFailure, LifecycleState,
    Phase,
};
use crate::{Result, ServiceError};

struct QueuedCloser {
    name: String,
    run: CloseFn,
}

enum Command {
    Register(QueuedCloser),
    Shutdown(oneshot::Sender<Vec<QueuedCloser>>),
}

struct Inner {
    id: Uuid,
    /// Guards registration against shutdown so no closer slips in late.
    state: Mutex<LifecycleState>,
    commands: mpsc::UnboundedSender<Command>,
    /// Initializers still running.
    pending: watch::Sender<usize>,
    closed: watch::Sender<bool>,
    init_failures: Mutex<Vec<LifecycleFailure>>,
}

/// Coordinates startup and shutdown of a group of resources.
///
/// Initializers start on their own task the moment they are managed.
/// Closers are queued with a background collector and run together when
/// [`close`](Self::close) is called. The manager is cheap to clone and all
/// clones share the same state.
///
/// Must be created inside a Tokio runtime.
///
/// # Examples
///
/// ```
/// use service_common::lifecycle::LifecycleManager;
///
/// # tokio_test::block_on(async {
/// let manager = LifecycleManager::new();
/// manager
///     .manage_close_fn("pool", || async { Ok(()) })
///     .unwrap();
///
/// let report = manager.close().await;
/// assert_eq!(report.closers_run, 1);
/// assert!(report.is_clean());
/// # });
/// ```
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<Inner>,
}

impl LifecycleManager {
    /// Create a manager and spawn its closer collector.
    #[must_use]
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        let (closed, _) = watch::channel(false);

        tokio::spawn(collect_closers(id, receiver));
        debug!(manager = %id, "Lifecycle manager started");

        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(LifecycleState::Running),
                commands,
                pending,
                closed,
                init_failures: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identifier attached to this manager's log events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    /// Number of initializers that have not finished yet.
    #[must_use]
    pub fn pending_initializations(&self) -> usize {
        *self.inner.pending.borrow()
    }

    /// Start initializing each item concurrently.
    pub fn manage_initialization<I>(&self, items: I)
    where
        I: IntoIterator<Item = Arc<dyn Initializer>>,
    {
        for item in items {
            let name = item.name();
            self.start_initialization(name, async move { item.initialize().await }.boxed());
        }
    }

    /// Wait until every initializer managed so far has finished.
    ///
    /// Returns the initialization failures collected since the previous call.
    pub async fn wait_initialized(&self) -> Vec<LifecycleFailure> {
        let mut pending = self.inner.pending.subscribe();
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = pending.wait_for(|count| *count == 0).await;
        std::mem::take(&mut *self.inner.init_failures.lock())
    }

    /// Queue each item's close hook until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ShuttingDown`] once shutdown has begun. Items
    /// before the rejected one stay queued.
    pub fn manage_close<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn Closer>>,
    {
        for item in items {
            let name = item.name();
            self.queue_close(
                name,
                Box::new(move || async move { item.close().await }.boxed()),
            )?;
        }
        Ok(())
    }

    /// Queue a bare async close hook until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ShuttingDown`] once shutdown has begun.
    pub fn manage_close_fn<F, Fut>(&self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.queue_close(name.into(), Box::new(move || f().boxed()))
    }

    /// Manage both hooks of each item.
    ///
    /// The close hook is queued before initialization starts, so the item is
    /// still closed if shutdown arrives while it is initializing.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ShuttingDown`] once shutdown has begun. A
    /// rejected item is not initialized.
    pub fn manage_lifecycle<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn InitializerCloser>>,
    {
        for item in items {
            let closer = Arc::clone(&item);
            self.queue_close(
                Closer::name(&*item),
                Box::new(move || async move { closer.close().await }.boxed()),
            )?;
            self.start_initialization(
                Initializer::name(&*item),
                async move { item.initialize().await }.boxed(),
            );
        }
        Ok(())
    }

    /// Run every queued closer concurrently and wait for all of them.
    ///
    /// Pending initializations are not awaited. Only the first call runs the
    /// closers; later calls wait for that shutdown and return an empty report.
    pub async fn close(&self) -> CloseReport {
        self.shutdown(None).await
    }

    /// Like [`close`](Self::close), but aborts closers still running after
    /// `timeout`.
    pub async fn close_with_timeout(&self, timeout: Duration) -> CloseReport {
        self.shutdown(Some(timeout)).await
    }

    /// Block until Ctrl+C or SIGTERM, then shut down within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] if the signal handlers cannot be installed.
    pub async fn run_until_signal(&self, timeout: Duration) -> Result<CloseReport> {
        super::wait_for_signal().await?;
        Ok(self.close_with_timeout(timeout).await)
    }

    fn start_initialization(&self, name: String, hook: BoxFuture<'static, anyhow::Result<()>>) {
        self.inner.pending.send_modify(|count| *count += 1);
        let guard = PendingGuard(Arc::clone(&self.inner));
        debug!(manager = %self.inner.id, name = %name, "Starting initialization");

        tokio::spawn(async move {
            let guard = guard;
            if let Some(failure) = run_hook(Phase::Initialize, name, hook).await {
                guard.0.init_failures.lock().push(failure);
            }
        });
    }

    fn queue_close(&self, name: String, run: CloseFn) -> Result<()> {
        let state = self.inner.state.lock();
        if *state != LifecycleState::Running {
            warn!(manager = %self.inner.id, name = %name, "Rejected closer registered after shutdown began");
            return Err(ServiceError::ShuttingDown);
        }
        debug!(manager = %self.inner.id, name = %name, "Queued closer");
        self.inner
            .commands
            .send(Command::Register(QueuedCloser { name, run }))
            .map_err(|_| ServiceError::ShuttingDown)?;
        drop(state);
        Ok(())
    }

    async fn shutdown(&self, timeout: Option<Duration>) -> CloseReport {
        let Some(reply) = self.begin_shutdown() else {
            let mut closed = self.inner.closed.subscribe();
            let _ = closed.wait_for(|done| *done).await;
            return CloseReport::default();
        };

        // Closers run on their own task so shutdown completes even if the
        // caller stops polling.
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let closers = reply.await.unwrap_or_else(|_| {
                warn!(manager = %inner.id, "Closer collector stopped before shutdown");
                Vec::new()
            });
            let report = run_closers(closers, timeout).await;

            *inner.state.lock() = LifecycleState::Closed;
            inner.closed.send_replace(true);
            info!(
                manager = %inner.id,
                closers = report.closers_run,
                failures = report.failures.len(),
                timed_out = report.timed_out,
                "Shutdown complete"
            );
            report
        });

        match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!(manager = %self.inner.id, error = %e, "Shutdown task failed");
                CloseReport::default()
            }
        }
    }

    fn begin_shutdown(&self) -> Option<oneshot::Receiver<Vec<QueuedCloser>>> {
        let mut state = self.inner.state.lock();
        if *state != LifecycleState::Running {
            return None;
        }
        *state = LifecycleState::Closing;
        info!(manager = %self.inner.id, "Initiating shutdown");

        let (reply, receiver) = oneshot::channel();
        if self.inner.commands.send(Command::Shutdown(reply)).is_err() {
            warn!(manager = %self.inner.id, "Closer collector is gone");
        }
        Some(receiver)
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("pending_initializations", &self.pending_initializations())
            .finish_non_exhaustive()
    }
}

/// Decrements the pending counter however the initializer task ends.
struct PendingGuard(Arc<Inner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0
            .pending
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

async fn collect_closers(id: Uuid, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut closers = Vec::new();
    while let Some(command) = commands.recv().await {
        match command {
            Command::Register(closer) => closers.push(closer),
            Command::Shutdown(reply) => {
                info!(manager = %id, closers = closers.len(), "Shutting down");
                let _ = reply.send(closers);
                return;
            }
        }
    }
    debug!(manager = %id, "All manager handles dropped, discarding queued closers");
}

async fn run_closers(closers: Vec<QueuedCloser>, timeout: Option<Duration>) -> CloseReport {
    let closers_run = closers.len();
    let running: Arc<Mutex<Vec<Option<String>>>> =
        Arc::new(Mutex::new(Vec::with_capacity(closers_run)));
    let mut tasks = JoinSet::new();

    for (idx, closer) in closers.into_iter().enumerate() {
        running.lock().push(Some(closer.name.clone()));
        let running = Arc::clone(&running);
        tasks.spawn(async move {
            let failure = run_hook(Phase::Close, closer.name, (closer.run)()).await;
            if let Some(slot) = running.lock().get_mut(idx) {
                *slot = None;
            }
            failure
        });
    }

    let mut failures = Vec::new();
    let timed_out = match timeout {
        None => {
            drain(&mut tasks, &mut failures).await;
            false
        }
        Some(limit) => {
            if tokio::time::timeout(limit, drain(&mut tasks, &mut failures))
                .await
                .is_ok()
            {
                false
            } else {
                warn!(timeout = ?limit, remaining = tasks.len(), "Shutdown timeout reached, aborting remaining closers");
                tasks.abort_all();
                drain(&mut tasks, &mut failures).await;
                failures.extend(running.lock().iter().flatten().map(|name| LifecycleFailure {
                    phase: Phase::Close,
                    name: name.clone(),
                    reason: format!("aborted after {limit:?} shutdown timeout"),
                }));
                true
            }
        }
    };

    CloseReport {
        closers_run,
        failures,
        timed_out,
    }
}

async fn drain(
    tasks: &mut JoinSet<Option<LifecycleFailure>>,
    failures: &mut Vec<LifecycleFailure>,
) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(failure)) => failures.push(failure),
            Ok(None) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Closer task failed"),
        }
    }
}

async fn run_hook(
    phase: Phase,
    name: String,
    hook: BoxFuture<'static, anyhow::Result<()>>,
) -> Option<LifecycleFailure> {
    let reason = match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => {
            debug!(%phase, name = %name, "Lifecycle hook completed");
            return None;
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };
    error!(%phase, name = %name, reason = %reason, "Lifecycle hook failed");
    Some(LifecycleFailure {
        phase,
        name,
        reason,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "panicked".to_string(), |msg| format!("panicked: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::time::{Instant, sleep};

    type Events = Arc<Mutex<Vec<String>>>;

    struct TestHook {
        label: &'static str,
        delay: Duration,
        fail: bool,
        events: Events,
    }

    impl TestHook {
        fn new(label: &'static str, events: &Events) -> Self {
            Self {
                label,
                delay: Duration::ZERO,
                fail: false,
                events: Arc::clone(events),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        async fn step(&self, phase: &str) -> anyhow::Result<()> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.events.lock().push(format!("{phase}:{}", self.label));
            if self.fail {
                anyhow::bail!("{} refused to {phase}", self.label);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Initializer for TestHook {
        async fn initialize(&self) -> anyhow::Result<()> {
            self.step("init").await
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    #[async_trait]
    impl Closer for TestHook {
        async fn close(&self) -> anyhow::Result<()> {
            self.step("close").await
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    struct Panicker;

    #[async_trait]
    impl Initializer for Panicker {
        async fn initialize(&self) -> anyhow::Result<()> {
            panic!("boom");
        }
    }

    fn events() -> Events {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_initializers_run_concurrently() {
        let log = events();
        let manager = LifecycleManager::new();
        let start = Instant::now();

        manager.manage_initialization([
            Arc::new(TestHook::new("db", &log).delayed(Duration::from_secs(1))) as Arc<dyn Initializer>,
            Arc::new(TestHook::new("cache", &log).delayed(Duration::from_secs(1))),
        ]);
        assert_eq!(manager.pending_initializations(), 2);

        let failures = manager.wait_initialized().await;
        assert!(failures.is_empty());
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(manager.pending_initializations(), 0);
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_wait_initialized_with_nothing_pending() {
        let manager = LifecycleManager::new();
        assert!(manager.wait_initialized().await.is_empty());
    }

    #[tokio::test]
    async fn test_initialization_failures_reported_once() {
        let log = events();
        let manager = LifecycleManager::new();
        manager.manage_initialization([
            Arc::new(TestHook::new("broken", &log).failing()) as Arc<dyn Initializer>
        ]);

        let failures = manager.wait_initialized().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].phase, Phase::Initialize);
        assert_eq!(failures[0].name, "broken");
        assert!(failures[0].reason.contains("refused"));

        assert!(manager.wait_initialized().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_initializer_is_contained() {
        let manager = LifecycleManager::new();
        manager.manage_initialization([Arc::new(Panicker) as Arc<dyn Initializer>]);

        let failures = manager.wait_initialized().await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].name.ends_with("Panicker"));
        assert_eq!(failures[0].reason, "panicked: boom");
        assert_eq!(manager.pending_initializations(), 0);
        assert_eq!(manager.state(), LifecycleState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closers_wait_for_shutdown() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([Arc::new(TestHook::new("queue", &log)) as Arc<dyn Closer>])
            .unwrap();

        sleep(Duration::from_secs(5)).await;
        assert!(log.lock().is_empty());

        let report = manager.close().await;
        assert_eq!(report.closers_run, 1);
        assert!(report.is_clean());
        assert_eq!(*log.lock(), vec!["close:queue"]);
        assert_eq!(manager.state(), LifecycleState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closers_run_concurrently() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([
                Arc::new(TestHook::new("a", &log).delayed(Duration::from_secs(2))) as Arc<dyn Closer>,
                Arc::new(TestHook::new("b", &log).delayed(Duration::from_secs(2))),
            ])
            .unwrap();

        let start = Instant::now();
        let report = manager.close().await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(report.closers_run, 2);
        assert!(report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_close_runs_while_initialization_pending() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_lifecycle([
                Arc::new(TestHook::new("slow", &log).delayed(Duration::from_secs(60)))
                    as Arc<dyn InitializerCloser>,
            ])
            .unwrap();
        assert_eq!(manager.pending_initializations(), 1);

        let report = manager.close_with_timeout(Duration::from_secs(120)).await;
        assert_eq!(report.closers_run, 1);
        assert!(report.is_clean());
        assert!(log.lock().contains(&"close:slow".to_string()));
    }

    #[tokio::test]
    async fn test_failing_closers_are_reported() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([Arc::new(TestHook::new("search", &log).failing()) as Arc<dyn Closer>])
            .unwrap();
        manager
            .manage_close_fn("flush", || async { anyhow::bail!("disk full") })
            .unwrap();
        manager
            .manage_close_fn("metrics", || async { Ok(()) })
            .unwrap();

        let report = manager.close().await;
        assert_eq!(report.closers_run, 3);
        assert!(!report.timed_out);

        let mut names: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["flush", "search"]);
        assert!(report.failures.iter().all(|f| f.phase == Phase::Close));
    }

    #[tokio::test]
    async fn test_register_after_close_is_rejected() {
        let manager = LifecycleManager::new();
        manager.close().await;

        let err = manager
            .manage_close_fn("late", || async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, ServiceError::ShuttingDown));

        let log = events();
        let err = manager
            .manage_lifecycle([Arc::new(TestHook::new("late", &log)) as Arc<dyn InitializerCloser>])
            .unwrap_err();
        assert!(matches!(err, ServiceError::ShuttingDown));
        assert_eq!(manager.pending_initializations(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([Arc::new(TestHook::new("db", &log)) as Arc<dyn Closer>])
            .unwrap();

        let first = manager.close().await;
        let second = manager.clone().close().await;

        assert_eq!(first.closers_run, 1);
        assert_eq!(second, CloseReport::default());
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_with_timeout_aborts_stragglers() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([
                Arc::new(TestHook::new("fast", &log)) as Arc<dyn Closer>,
                Arc::new(TestHook::new("stuck", &log).delayed(Duration::from_secs(3600))),
            ])
            .unwrap();

        let start = Instant::now();
        let report = manager.close_with_timeout(Duration::from_secs(1)).await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(report.timed_out);
        assert_eq!(report.closers_run, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "stuck");
        assert!(report.failures[0].reason.contains("aborted"));
        assert_eq!(*log.lock(), vec!["close:fast"]);
        assert_eq!(manager.state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn test_concurrent_close_runs_closers_once() {
        let log = events();
        let manager = LifecycleManager::new();
        manager
            .manage_close([Arc::new(TestHook::new("db", &log)) as Arc<dyn Closer>])
            .unwrap();

        let (a, b) = tokio::join!(manager.close(), manager.close());
        assert_eq!(a.closers_run + b.closers_run, 1);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(manager.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "panicked: owned");

        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(other.as_ref()), "panicked");
    }
}
