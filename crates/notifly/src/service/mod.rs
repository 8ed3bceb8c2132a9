//! Notification dispatch services.
//!
//! Both variants share one [`Dispatcher`], so retry and event semantics are
//! identical; they differ only in where `send_async` runs.
//!
//! - [`SyncNotificationService`]: everything on the caller's thread
//! - [`AsyncNotificationService`]: `send_async` on a worker pool

pub mod async_service;
pub mod dispatcher;
pub mod handle;
pub mod sync_service;

use std::sync::Arc;

use crate::error::DispatchError;
use crate::events::{NotificationEventListener, SubscriptionId};
use crate::types::{NotificationRequest, NotificationResult};

pub use async_service::AsyncNotificationService;
pub use dispatcher::Dispatcher;
pub use handle::{BatchHandle, DispatchHandle, DispatchOutcome};
pub use sync_service::SyncNotificationService;

/// Entry point for sending notifications.
///
/// Every dispatch publishes exactly one `Pending` event and then exactly one
/// terminal event (`Sent` or `Failed`) under a fresh correlation id. Errors
/// reach the caller only after the `Failed` event has been published.
///
/// `send` and the blocking handle methods must be called from outside an
/// async runtime; async callers `.await` the handles instead.
pub trait NotificationService: Send + Sync {
    /// Dispatch on the calling thread and return the outcome.
    fn send(&self, request: NotificationRequest) -> Result<NotificationResult, DispatchError>;

    /// Dispatch and return a handle that completes with the same outcome
    /// `send` would have produced.
    fn send_async(&self, request: NotificationRequest) -> DispatchHandle;

    /// Dispatch every request independently. The batch resolves once all of
    /// them are done; no request is cancelled because a sibling failed.
    fn send_async_batch(&self, requests: Vec<NotificationRequest>) -> BatchHandle {
        BatchHandle::new(requests.into_iter().map(|r| self.send_async(r)).collect())
    }

    fn subscribe(&self, listener: Arc<dyn NotificationEventListener>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Release execution resources. Idempotent.
    ///
    /// After shutdown, new sends are rejected with `DispatchError::ShutDown`
    /// without publishing any event.
    fn shutdown(&self);

    fn is_shut_down(&self) -> bool;
}
