use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelRegistry, DispatchContext, new_correlation_id};
use crate::error::{DispatchError, panic_message};
use crate::events::{EventPublisher, NotificationEvent};
use crate::types::{ChannelKind, NotificationRequest, NotificationResult};

/// A dispatch whose `Pending` event has been published but which has not
/// touched a channel yet.
#[derive(Debug)]
pub(crate) struct PendingDispatch {
    correlation_id: String,
    request: NotificationRequest,
}

impl PendingDispatch {
    pub(crate) fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub(crate) fn channel(&self) -> ChannelKind {
        self.request.channel
    }

    pub(crate) fn recipient(&self) -> &str {
        &self.request.recipient
    }
}

/// Dispatch core shared by the synchronous and pooled services.
///
/// Owns the event lifecycle of a single request: exactly one `Pending`
/// event, then zero or more `Retrying` events (from the retry executor),
/// then exactly one terminal event. The terminal event is always published
/// before an error reaches the caller.
pub struct Dispatcher {
    registry: ChannelRegistry,
    events: Arc<EventPublisher>,
}

impl Dispatcher {
    pub fn new(registry: ChannelRegistry, events: Arc<EventPublisher>) -> Self {
        Self { registry, events }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventPublisher> {
        &self.events
    }

    /// Assign a correlation id and publish `Pending`.
    pub(crate) fn begin(&self, request: NotificationRequest) -> PendingDispatch {
        let correlation_id = new_correlation_id();
        debug!(
            correlation_id = %correlation_id,
            channel = %request.channel,
            "Dispatch started"
        );
        self.events.publish(&NotificationEvent::pending(
            correlation_id.clone(),
            request.channel,
            request.recipient.clone(),
        ));
        PendingDispatch {
            correlation_id,
            request,
        }
    }

    /// Route to the channel, then publish the terminal event.
    pub(crate) async fn complete(
        &self,
        pending: PendingDispatch,
        cancel: CancellationToken,
    ) -> Result<NotificationResult, DispatchError> {
        let PendingDispatch {
            correlation_id,
            request,
        } = pending;
        let kind = request.channel;
        let recipient = Some(request.recipient.clone());

        let outcome = match self.registry.get(kind) {
            None => Err(DispatchError::ChannelNotRegistered(kind)),
            Some(channel) => {
                let ctx =
                    DispatchContext::new(correlation_id.clone(), &request, cancel, self.events.clone());
                match AssertUnwindSafe(channel.send(&request, &ctx))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => Err(DispatchError::Provider(e)),
                    Err(panic) => Err(DispatchError::ChannelPanicked(panic_message(
                        panic.as_ref(),
                    ))),
                }
            }
        };

        match outcome {
            Ok(result) if result.is_success() => {
                info!(
                    correlation_id = %correlation_id,
                    channel = %kind,
                    provider = %result.provider_name(),
                    attempt = result.attempt_number(),
                    "Notification sent"
                );
                self.events.publish(&NotificationEvent::sent(
                    correlation_id,
                    kind,
                    recipient,
                    result.clone(),
                ));
                Ok(result)
            }
            Ok(result) => {
                warn!(
                    correlation_id = %correlation_id,
                    channel = %kind,
                    provider = %result.provider_name(),
                    attempt = result.attempt_number(),
                    error = result.error_details().unwrap_or("unknown"),
                    "Notification failed"
                );
                self.events.publish(&NotificationEvent::failed(
                    correlation_id,
                    kind,
                    recipient,
                    result.clone(),
                ));
                Ok(result)
            }
            Err(err) => {
                self.publish_error(correlation_id, kind, recipient, &err);
                Err(err)
            }
        }
    }

    /// Publish the `Failed` event for a dispatch ending in `err`.
    pub(crate) fn publish_error(
        &self,
        correlation_id: String,
        kind: ChannelKind,
        recipient: Option<String>,
        err: &DispatchError,
    ) {
        error!(
            correlation_id = %correlation_id,
            channel = %kind,
            error = %err,
            "Dispatch failed"
        );
        let result =
            NotificationResult::failed(kind.as_str(), format!("Error: {err}"), err.to_string());
        self.events.publish(&NotificationEvent::failed(
            correlation_id,
            kind,
            recipient,
            result,
        ));
    }

    /// Run one request start to finish on the current task.
    pub async fn dispatch(
        &self,
        request: NotificationRequest,
        cancel: CancellationToken,
    ) -> Result<NotificationResult, DispatchError> {
        let pending = self.begin(request);
        self.complete(pending, cancel).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("listeners", &self.events.listener_count())
            .finish()
    }
}
