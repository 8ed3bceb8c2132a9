use thiserror::Error;

use crate::types::{ChannelKind, NotificationResult};

/// Failure signalled by a provider (or a channel on its behalf).
///
/// Retryable per policy. Once retries are exhausted it is re-raised to the
/// dispatch caller instead of being folded into a `NotificationResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Provider [{provider}] error: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No channel configured for: {0}")]
    ChannelNotRegistered(ChannelKind),

    #[error("Failed to send notification: {0}")]
    Provider(#[from] ProviderError),

    #[error("Channel panicked: {0}")]
    ChannelPanicked(String),

    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Notification service has been shut down")]
    ShutDown,

    /// Every outcome is kept, in request order.
    #[error("{failed} of {total} notifications in batch failed")]
    Batch {
        failed: usize,
        total: usize,
        outcomes: Vec<Result<NotificationResult, DispatchError>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        ValidationError(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[source] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to start worker pool: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Render a caught panic payload for logging.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
