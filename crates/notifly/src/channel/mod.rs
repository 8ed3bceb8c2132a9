//! Delivery channels (email, SMS, push) and the registry that maps a channel
//! kind to its bound channel.

pub mod context;
pub mod delivery;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::NotificationProvider;
use crate::retry::RetryExecutor;
use crate::types::{ChannelKind, NotificationRequest, NotificationResult};

pub use context::{DispatchContext, new_correlation_id};
pub use delivery::DeliveryChannel;
pub use registry::ChannelRegistry;

/// A delivery category bound to at most one active provider.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Send through the active provider.
    ///
    /// A missing or unconfigured provider is reported as a `ProviderError`.
    async fn send(
        &self,
        request: &NotificationRequest,
        ctx: &DispatchContext,
    ) -> Result<NotificationResult, ProviderError>;

    /// The kind of requests this channel handles.
    fn channel_kind(&self) -> ChannelKind;

    /// Swap the active provider.
    fn set_provider(&self, provider: Arc<dyn NotificationProvider>);

    fn provider(&self) -> Option<Arc<dyn NotificationProvider>>;

    /// Retry-capable channels return themselves so that a builder can attach
    /// a retry executor without knowing the concrete type.
    fn as_retryable(&self) -> Option<&dyn RetryableChannel> {
        None
    }
}

/// Channel that can run its provider under a [`RetryExecutor`].
pub trait RetryableChannel: NotificationChannel {
    /// `None` means the provider is called directly, once.
    fn set_retry_executor(&self, executor: Option<RetryExecutor>);

    fn retry_executor(&self) -> Option<RetryExecutor>;
}
