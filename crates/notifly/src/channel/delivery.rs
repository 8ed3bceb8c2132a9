use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{DispatchContext, NotificationChannel, RetryableChannel};
use crate::error::ProviderError;
use crate::provider::NotificationProvider;
use crate::retry::RetryExecutor;
use crate::types::{ChannelKind, NotificationRequest, NotificationResult};

/// Retry-capable channel delegating to one swappable provider.
pub struct DeliveryChannel {
    kind: ChannelKind,
    provider: RwLock<Option<Arc<dyn NotificationProvider>>>,
    retry_executor: RwLock<Option<RetryExecutor>>,
}

impl DeliveryChannel {
    /// Channel with no provider yet; sending fails until one is set.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            provider: RwLock::new(None),
            retry_executor: RwLock::new(None),
        }
    }

    pub fn with_provider(kind: ChannelKind, provider: Arc<dyn NotificationProvider>) -> Self {
        let channel = Self::new(kind);
        channel.set_provider(provider);
        channel
    }

    pub fn email(provider: Arc<dyn NotificationProvider>) -> Self {
        Self::with_provider(ChannelKind::Email, provider)
    }

    pub fn sms(provider: Arc<dyn NotificationProvider>) -> Self {
        Self::with_provider(ChannelKind::Sms, provider)
    }

    pub fn push(provider: Arc<dyn NotificationProvider>) -> Self {
        Self::with_provider(ChannelKind::Push, provider)
    }

    /// Attach a retry executor at construction.
    pub fn with_retry(self, executor: RetryExecutor) -> Self {
        self.set_retry_executor(Some(executor));
        self
    }

    fn name(&self) -> &'static str {
        match self.kind {
            ChannelKind::Email => "EmailChannel",
            ChannelKind::Sms => "SmsChannel",
            ChannelKind::Push => "PushChannel",
        }
    }
}

#[async_trait]
impl NotificationChannel for DeliveryChannel {
    async fn send(
        &self,
        request: &NotificationRequest,
        ctx: &DispatchContext,
    ) -> Result<NotificationResult, ProviderError> {
        let provider = self.provider().ok_or_else(|| {
            ProviderError::new(self.name(), format!("No {} provider configured", self.kind))
        })?;

        if !provider.is_configured() {
            return Err(ProviderError::new(
                self.name(),
                format!(
                    "{} provider is not properly configured: {}",
                    self.kind,
                    provider.name()
                ),
            ));
        }

        debug!(
            correlation_id = %ctx.correlation_id(),
            channel = %self.kind,
            provider = %provider.name(),
            "Sending via provider"
        );

        match self.retry_executor() {
            Some(executor) => {
                executor
                    .execute_with_retry(provider.as_ref(), request, ctx)
                    .await
            }
            None => provider.send(request).await,
        }
    }

    fn channel_kind(&self) -> ChannelKind {
        self.kind
    }

    fn set_provider(&self, provider: Arc<dyn NotificationProvider>) {
        debug!(channel = %self.kind, provider = %provider.name(), "Set channel provider");
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = Some(provider);
    }

    fn provider(&self) -> Option<Arc<dyn NotificationProvider>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn as_retryable(&self) -> Option<&dyn RetryableChannel> {
        Some(self)
    }
}

impl RetryableChannel for DeliveryChannel {
    fn set_retry_executor(&self, executor: Option<RetryExecutor>) {
        *self
            .retry_executor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = executor;
    }

    fn retry_executor(&self) -> Option<RetryExecutor> {
        self.retry_executor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider = self.provider().map(|p| p.name().to_string());
        f.debug_struct("DeliveryChannel")
            .field("kind", &self.kind)
            .field("provider", &provider)
            .field("retry_executor", &self.retry_executor())
            .finish()
    }
}
