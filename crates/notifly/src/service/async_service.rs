use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use super::handle::{DispatchHandle, DispatchOutcome};
use super::NotificationService;
use crate::channel::ChannelRegistry;
use crate::config::PoolConfig;
use crate::error::{ConfigError, DispatchError};
use crate::events::{EventPublisher, NotificationEventListener, SubscriptionId};
use crate::types::{ChannelKind, NotificationRequest, NotificationResult};

/// Dispatches `send_async` requests on an owned worker pool.
///
/// `send` still runs on the caller's thread and blocks it. `send_async`
/// publishes `Pending` on the caller's thread, then hands the rest of the
/// dispatch to a pool worker, so retry backoff never blocks the caller or
/// other dispatches.
///
/// Shutdown stops accepting work, waits up to `shutdown_grace` for in-flight
/// dispatches, then cancels their retry waits and waits up to `force_grace`
/// more before tearing the pool down. Pooled dispatches still running after
/// that publish `Failed` and resolve their handles with
/// `DispatchError::Cancelled`. A blocking `send` still running at that point
/// keeps the pool alive until it returns.
pub struct AsyncNotificationService {
    dispatcher: Arc<Dispatcher>,
    runtime: Mutex<Option<Arc<Runtime>>>,
    handle: Handle,
    tracker: TaskTracker,
    root: CancellationToken,
    closed: AtomicBool,
    pool: PoolConfig,
}

impl AsyncNotificationService {
    pub fn new(
        registry: ChannelRegistry,
        events: Arc<EventPublisher>,
        pool: PoolConfig,
    ) -> Result<Self, ConfigError> {
        pool.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(pool.worker_threads)
            .max_blocking_threads(pool.max_blocking_threads)
            .thread_keep_alive(pool.keep_alive())
            .thread_name("notifly-worker")
            .enable_time()
            .build()
            .map_err(ConfigError::Runtime)?;
        let handle = runtime.handle().clone();

        info!(
            channels = registry.len(),
            worker_threads = pool.worker_threads,
            max_blocking_threads = pool.max_blocking_threads,
            "Started notification worker pool"
        );

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(registry, events)),
            runtime: Mutex::new(Some(Arc::new(runtime))),
            handle,
            tracker: TaskTracker::new(),
            root: CancellationToken::new(),
            closed: AtomicBool::new(false),
            pool,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool
    }

    /// Number of dispatches currently running on the pool or on callers.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Register a new dispatch with the tracker, letting `with_runtime` pick
    /// what it needs from the live runtime.
    ///
    /// Runs under the runtime lock, so a concurrent `shutdown` either waits
    /// for the returned token or has already taken the runtime.
    fn admit<T>(
        &self,
        with_runtime: impl FnOnce(&Arc<Runtime>) -> T,
    ) -> Result<(T, TaskTrackerToken), DispatchError> {
        let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        match runtime.as_ref() {
            Some(runtime) if !self.closed.load(Ordering::Acquire) => {
                Ok((with_runtime(runtime), self.tracker.token()))
            }
            _ => {
                warn!("Rejected send on shut down notification service");
                Err(DispatchError::ShutDown)
            }
        }
    }
}

/// Delivers the outcome of a pooled dispatch to its handle.
///
/// If the task is torn down before `finish` runs, dropping this publishes
/// `Failed` and then resolves the handle with `DispatchError::Cancelled`.
struct Completion {
    dispatcher: Arc<Dispatcher>,
    correlation_id: String,
    channel: ChannelKind,
    recipient: String,
    reply: Option<oneshot::Sender<DispatchOutcome>>,
}

impl Completion {
    fn finish(mut self, outcome: DispatchOutcome) {
        if let Some(reply) = self.reply.take() {
            // The caller may have dropped the handle
            let _ = reply.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        let err = DispatchError::Cancelled;
        self.dispatcher.publish_error(
            self.correlation_id.clone(),
            self.channel,
            Some(self.recipient.clone()),
            &err,
        );
        let _ = reply.send(Err(err));
    }
}

impl NotificationService for AsyncNotificationService {
    fn send(&self, request: NotificationRequest) -> Result<NotificationResult, DispatchError> {
        let (runtime, in_flight) = self.admit(Arc::clone)?;
        let dispatch = self.dispatcher.dispatch(request, self.root.child_token());
        let outcome = runtime.block_on(dispatch);
        // Release the runtime before the token so a waiting `shutdown` can reclaim it
        drop(runtime);
        drop(in_flight);
        outcome
    }

    fn send_async(&self, request: NotificationRequest) -> DispatchHandle {
        let in_flight = match self.admit(|_| ()) {
            Ok(((), in_flight)) => in_flight,
            Err(e) => return DispatchHandle::ready(None, Err(e)),
        };

        let pending = self.dispatcher.begin(request);
        let correlation_id = pending.correlation_id().to_string();
        let cancel = self.root.child_token();
        let (tx, rx) = oneshot::channel();
        let completion = Completion {
            dispatcher: self.dispatcher.clone(),
            correlation_id: correlation_id.clone(),
            channel: pending.channel(),
            recipient: pending.recipient().to_string(),
            reply: Some(tx),
        };

        let dispatcher = self.dispatcher.clone();
        let token = cancel.clone();
        self.tracker.spawn_on(
            async move {
                let outcome = dispatcher.complete(pending, token).await;
                completion.finish(outcome);
            },
            &self.handle,
        );
        drop(in_flight);

        DispatchHandle::waiting(correlation_id, rx, cancel)
    }

    fn subscribe(&self, listener: Arc<dyn NotificationEventListener>) -> SubscriptionId {
        self.dispatcher.events().subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.events().unsubscribe(id)
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Notification worker pool already shut down");
            return;
        }
        self.tracker.close();

        let Some(runtime) = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        info!(in_flight = self.tracker.len(), "Shutting down notification worker pool");

        let drained = runtime.block_on(async {
            if tokio::time::timeout(self.pool.shutdown_grace(), self.tracker.wait())
                .await
                .is_ok()
            {
                return true;
            }
            warn!(
                remaining = self.tracker.len(),
                grace_ms = self.pool.shutdown_grace_ms,
                "Grace period elapsed, cancelling in-flight dispatches"
            );
            self.root.cancel();
            tokio::time::timeout(self.pool.force_grace(), self.tracker.wait())
                .await
                .is_ok()
        });

        if !drained {
            error!(
                remaining = self.tracker.len(),
                "Notification worker pool did not terminate cleanly"
            );
        }
        match Arc::try_unwrap(runtime) {
            Ok(runtime) => {
                runtime.shutdown_timeout(self.pool.force_grace());
                info!("Notification worker pool shut down");
            }
            Err(_) => warn!("Blocking sends still running, worker pool stops after the last one"),
        }
    }

    fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for AsyncNotificationService {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            self.root.cancel();
            // No `send` can be running once we have `&mut self`
            if let Ok(runtime) = Arc::try_unwrap(runtime) {
                runtime.shutdown_background();
            }
        }
    }
}

impl std::fmt::Debug for AsyncNotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncNotificationService")
            .field("dispatcher", &self.dispatcher)
            .field("pool", &self.pool)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
