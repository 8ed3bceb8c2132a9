//! Listener trait for notification lifecycle events.
//!
//! Listeners are called inline by the publisher on whichever thread published
//! the event. They are:
//! - **Isolated**: an error or panic in one listener never reaches other
//!   listeners or the dispatch that published the event
//! - **Synchronous**: keep them quick; hand heavy work to a channel

use tracing::{info, warn};

use super::types::NotificationEvent;
use crate::types::NotificationStatus;

/// Trait for notification event listeners.
///
/// Any `Fn(&NotificationEvent) + Send + Sync` closure is a listener.
pub trait NotificationEventListener: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle an event.
    ///
    /// Errors are logged by the publisher but don't propagate.
    fn on_event(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

impl<F> NotificationEventListener for F
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn on_event(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        self(event);
        Ok(())
    }
}

/// Listener that writes every lifecycle event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl NotificationEventListener for LoggingListener {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_event(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        match event.status {
            NotificationStatus::Failed => {
                let error = event.result.as_ref().and_then(|r| r.error_details());
                warn!(
                    correlation_id = %event.correlation_id,
                    channel = %event.channel,
                    attempt = event.attempt_number,
                    error = ?error,
                    "Notification failed"
                );
            }
            status => {
                info!(
                    correlation_id = %event.correlation_id,
                    channel = %event.channel,
                    attempt = event.attempt_number,
                    status = %status,
                    "Notification event"
                );
            }
        }
        Ok(())
    }
}
