use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::{EventPublisher, NotificationEvent};
use crate::types::{ChannelKind, NotificationRequest};

/// Generate a fresh correlation id for one dispatch.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-dispatch state handed down to the channel and its retry executor:
/// the correlation id, the cancellation token that interrupts retry waits,
/// and the publisher used for `Retrying` events.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    correlation_id: String,
    channel: ChannelKind,
    recipient: Option<String>,
    cancel: CancellationToken,
    events: Option<Arc<EventPublisher>>,
}

impl DispatchContext {
    pub(crate) fn new(
        correlation_id: String,
        request: &NotificationRequest,
        cancel: CancellationToken,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            correlation_id,
            channel: request.channel,
            recipient: Some(request.recipient.clone()),
            cancel,
            events: Some(events),
        }
    }

    /// Context for calling a channel outside a notification service.
    ///
    /// Never cancelled and publishes nothing.
    pub fn detached(request: &NotificationRequest) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            channel: request.channel,
            recipient: Some(request.recipient.clone()),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Replace the cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the dispatch is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Publish a `Retrying` event for the attempt about to run.
    pub fn notify_retrying(&self, attempt: u32) {
        if let Some(events) = &self.events {
            events.publish(&NotificationEvent::retrying(
                self.correlation_id.clone(),
                self.channel,
                self.recipient.clone(),
                attempt,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationStatus;
    use std::sync::Mutex;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = new_correlation_id();
        let b = new_correlation_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_detached_context_publishes_nothing() {
        let request = NotificationRequest::sms("+15551234567", "hi");
        let ctx = DispatchContext::detached(&request);
        assert_eq!(ctx.channel(), ChannelKind::Sms);
        assert!(!ctx.is_cancelled());
        ctx.notify_retrying(2);
    }

    #[test]
    fn test_notify_retrying_publishes_event() {
        let publisher = EventPublisher::new_shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        publisher.subscribe(Arc::new(move |e: &NotificationEvent| {
            sink.lock().unwrap().push(e.clone());
        }));

        let request = NotificationRequest::email("a@example.com", "s", "m");
        let ctx = DispatchContext::new(
            "corr-1".to_string(),
            &request,
            CancellationToken::new(),
            publisher,
        );
        ctx.notify_retrying(3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, NotificationStatus::Retrying);
        assert_eq!(seen[0].attempt_number, 3);
        assert_eq!(seen[0].correlation_id, "corr-1");
        assert_eq!(seen[0].recipient.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_cancellation() {
        let request = NotificationRequest::push("token", "t", "b");
        let token = CancellationToken::new();
        let ctx = DispatchContext::detached(&request).with_cancellation(token.clone());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
