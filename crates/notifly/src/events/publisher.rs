//! Event publisher for notification lifecycle events.
//!
//! The `EventPublisher` fans each event out to every subscribed listener.
//! The listener list lives behind an `ArcSwap`, so `publish` works on a
//! point-in-time snapshot and never holds a lock while listeners run:
//! subscribing or unsubscribing during a publish cannot cause a missed or
//! duplicated delivery to listeners that were already subscribed.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{debug, error, warn};

use super::listener::NotificationEventListener;
use super::types::NotificationEvent;
use crate::error::panic_message;

/// Handle returned by [`EventPublisher::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    listener: Arc<dyn NotificationEventListener>,
}

/// Thread-safe multi-subscriber fan-out of notification events.
///
/// Listener errors and panics are contained: they are logged and delivery
/// continues with the next listener.
pub struct EventPublisher {
    subscriptions: ArcSwap<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            subscriptions: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new publisher wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe a listener to all future events.
    pub fn subscribe(&self, listener: Arc<dyn NotificationEventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = listener.name().to_string();
        let subscription = Subscription { id, listener };

        self.subscriptions.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(subscription.clone());
            next
        });

        debug!(listener = %name, subscription = id.0, "Subscribed listener");
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let previous = self.subscriptions.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });

        let removed = previous.iter().any(|s| s.id == id);
        if removed {
            debug!(subscription = id.0, "Unsubscribed listener");
        }
        removed
    }

    /// Publish an event to every listener subscribed at this moment.
    ///
    /// Returns the number of listeners that handled the event without error.
    pub fn publish(&self, event: &NotificationEvent) -> usize {
        let snapshot = self.subscriptions.load_full();

        debug!(
            correlation_id = %event.correlation_id,
            status = %event.status,
            listeners = snapshot.len(),
            "Publishing event"
        );

        let mut delivered = 0;
        for subscription in snapshot.iter() {
            let listener = &subscription.listener;
            match std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        listener = %listener.name(),
                        correlation_id = %event.correlation_id,
                        error = %e,
                        "Event listener failed"
                    );
                }
                Err(panic) => {
                    let panic_msg = panic_message(panic.as_ref());
                    error!(
                        listener = %listener.name(),
                        correlation_id = %event.correlation_id,
                        panic = %panic_msg,
                        "Event listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Get the number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.subscriptions.load().len()
    }

    /// Remove all listeners.
    pub fn clear(&self) {
        self.subscriptions.store(Arc::new(Vec::new()));
        debug!("Cleared all listeners");
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
