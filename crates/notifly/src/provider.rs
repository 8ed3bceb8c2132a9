use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{NotificationRequest, NotificationResult};

/// Delivery backend behind a channel (SendGrid, Twilio, FCM, ...).
///
/// Providers are black boxes: the dispatcher makes no assumption about their
/// latency or success rate. A provider reports a rejected delivery either as
/// an unsuccessful `NotificationResult` or as a `ProviderError`; the two are
/// handled differently once retries are exhausted.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Send a notification
    async fn send(&self, request: &NotificationRequest)
    -> Result<NotificationResult, ProviderError>;

    /// Provider name for results, logs and errors
    fn name(&self) -> &str;

    /// Check that credentials and settings are present
    fn is_configured(&self) -> bool;
}
