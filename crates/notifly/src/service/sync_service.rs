use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::dispatcher::Dispatcher;
use super::handle::DispatchHandle;
use super::NotificationService;
use crate::channel::ChannelRegistry;
use crate::error::{ConfigError, DispatchError};
use crate::events::{EventPublisher, NotificationEventListener, SubscriptionId};
use crate::types::{NotificationRequest, NotificationResult};

/// Dispatches on the caller's thread.
///
/// `send_async` runs the dispatch to completion before returning, so its
/// handle is already resolved. Retry backoff blocks the calling thread.
/// There is no pool: `shutdown` releases nothing and only stops new sends.
pub struct SyncNotificationService {
    dispatcher: Dispatcher,
    runtime: Runtime,
    closed: AtomicBool,
}

impl SyncNotificationService {
    pub fn new(registry: ChannelRegistry, events: Arc<EventPublisher>) -> Result<Self, ConfigError> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(ConfigError::Runtime)?;

        debug!(channels = registry.len(), "Created synchronous notification service");
        Ok(Self {
            dispatcher: Dispatcher::new(registry, events),
            runtime,
            closed: AtomicBool::new(false),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn reject_if_closed(&self) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            warn!("Rejected send on shut down notification service");
            return Err(DispatchError::ShutDown);
        }
        Ok(())
    }
}

impl NotificationService for SyncNotificationService {
    fn send(&self, request: NotificationRequest) -> Result<NotificationResult, DispatchError> {
        self.reject_if_closed()?;
        self.runtime
            .block_on(self.dispatcher.dispatch(request, CancellationToken::new()))
    }

    fn send_async(&self, request: NotificationRequest) -> DispatchHandle {
        if let Err(e) = self.reject_if_closed() {
            return DispatchHandle::ready(None, Err(e));
        }
        let pending = self.dispatcher.begin(request);
        let correlation_id = pending.correlation_id().to_string();
        let outcome = self
            .runtime
            .block_on(self.dispatcher.complete(pending, CancellationToken::new()));
        DispatchHandle::ready(Some(correlation_id), outcome)
    }

    fn subscribe(&self, listener: Arc<dyn NotificationEventListener>) -> SubscriptionId {
        self.dispatcher.events().subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.events().unsubscribe(id)
    }

    fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Synchronous notification service shut down");
        }
    }

    fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SyncNotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncNotificationService")
            .field("dispatcher", &self.dispatcher)
            .field("closed", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryChannel;
    use crate::error::ProviderError;
    use crate::events::NotificationEvent;
    use crate::provider::NotificationProvider;
    use crate::types::NotificationStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OkProvider;

    #[async_trait]
    impl NotificationProvider for OkProvider {
        async fn send(
            &self,
            _request: &NotificationRequest,
        ) -> Result<NotificationResult, ProviderError> {
            Ok(NotificationResult::sent("Ok", "delivered"))
        }

        fn name(&self) -> &str {
            "Ok"
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn service() -> (SyncNotificationService, Arc<Mutex<Vec<NotificationEvent>>>) {
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(DeliveryChannel::email(Arc::new(OkProvider))));
        let service = SyncNotificationService::new(registry, EventPublisher::new_shared()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        service.subscribe(Arc::new(move |e: &NotificationEvent| {
            sink.lock().unwrap().push(e.clone());
        }));
        (service, seen)
    }

    #[test]
    fn test_send() {
        let (service, seen) = service();
        let result = service
            .send(NotificationRequest::email("a@example.com", "s", "m"))
            .unwrap();
        assert!(result.is_success());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_send_async_is_already_resolved() {
        let (service, seen) = service();
        let handle = service.send_async(NotificationRequest::email("a@example.com", "s", "m"));

        // Both events were published before send_async returned
        let events = seen.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, NotificationStatus::Sent);
        assert_eq!(handle.correlation_id(), Some(events[0].correlation_id.as_str()));
        assert!(handle.wait().unwrap().is_success());
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects() {
        let (service, seen) = service();
        service.shutdown();
        service.shutdown();
        assert!(service.is_shut_down());

        let err = service
            .send(NotificationRequest::email("a@example.com", "s", "m"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::ShutDown));

        let handle = service.send_async(NotificationRequest::email("a@example.com", "s", "m"));
        assert!(handle.correlation_id().is_none());
        assert!(matches!(handle.wait(), Err(DispatchError::ShutDown)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let (service, seen) = service();
        let extra = service.subscribe(Arc::new(|_: &NotificationEvent| {}));
        assert!(service.unsubscribe(extra));
        assert!(!service.unsubscribe(extra));

        service
            .send(NotificationRequest::email("a@example.com", "s", "m"))
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
