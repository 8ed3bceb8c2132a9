//! Builder wiring channels, retry, listeners and an execution mode into a
//! notification service.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::channel::{ChannelRegistry, NotificationChannel};
use crate::config::{ExecutionMode, PoolConfig, ServiceConfig};
use crate::error::ConfigError;
use crate::events::{EventPublisher, LoggingListener, NotificationEventListener};
use crate::retry::{ExponentialBackoffRetry, RetryConfig, RetryExecutor, RetryPolicy};
use crate::service::{AsyncNotificationService, NotificationService, SyncNotificationService};

enum RetrySetting {
    Config(RetryConfig),
    Policy(Arc<dyn RetryPolicy>),
}

/// Builder for [`NotificationService`] implementations.
///
/// ```no_run
/// use std::sync::Arc;
/// use notifly::{DeliveryChannel, NotificationServiceBuilder, RetryConfig};
/// # fn provider() -> Arc<dyn notifly::NotificationProvider> { unimplemented!() }
///
/// let service = NotificationServiceBuilder::new()
///     .register_channel(Arc::new(DeliveryChannel::email(provider())))
///     .retry_config(RetryConfig::default().with_max_attempts(3))
///     .with_event_logging()
///     .build()?;
/// # Ok::<(), notifly::ConfigError>(())
/// ```
pub struct NotificationServiceBuilder {
    registry: ChannelRegistry,
    retry: Option<RetrySetting>,
    mode: ExecutionMode,
    pool: PoolConfig,
    listeners: Vec<Arc<dyn NotificationEventListener>>,
    log_events: bool,
}

impl NotificationServiceBuilder {
    pub fn new() -> Self {
        Self {
            registry: ChannelRegistry::new(),
            retry: None,
            mode: ExecutionMode::default(),
            pool: PoolConfig::default(),
            listeners: Vec::new(),
            log_events: false,
        }
    }

    /// Seed a builder from loaded configuration. Channels are added after.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut builder = Self::new()
            .execution_mode(config.mode)
            .pool_config(config.pool.clone());
        if let Some(retry) = &config.retry {
            builder = builder.retry_config(retry.clone());
        }
        if config.log_events {
            builder = builder.with_event_logging();
        }
        builder
    }

    /// Register a channel under its own kind, replacing any earlier one.
    pub fn register_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.registry.register(channel);
        self
    }

    /// Use a prepared registry. Channels registered earlier are discarded.
    pub fn registry(mut self, registry: ChannelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Exponential backoff retry for every retry-capable channel.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = Some(RetrySetting::Config(config));
        self
    }

    /// Custom retry policy for every retry-capable channel.
    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(RetrySetting::Policy(policy));
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn sync(self) -> Self {
        self.execution_mode(ExecutionMode::Sync)
    }

    pub fn asynchronous(self) -> Self {
        self.execution_mode(ExecutionMode::Async)
    }

    pub fn pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Subscribe a listener before the first dispatch can happen.
    pub fn listener(mut self, listener: Arc<dyn NotificationEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Log every lifecycle event through `tracing`.
    pub fn with_event_logging(mut self) -> Self {
        self.log_events = true;
        self
    }

    /// Build the service for the configured execution mode.
    pub fn build(self) -> Result<Box<dyn NotificationService>, ConfigError> {
        match self.mode {
            ExecutionMode::Sync => Ok(Box::new(self.build_sync()?)),
            ExecutionMode::Async => Ok(Box::new(self.build_async()?)),
        }
    }

    pub fn build_sync(self) -> Result<SyncNotificationService, ConfigError> {
        let (registry, events) = self.prepare();
        SyncNotificationService::new(registry, events)
    }

    pub fn build_async(self) -> Result<AsyncNotificationService, ConfigError> {
        let pool = self.pool.clone();
        let (registry, events) = self.prepare();
        AsyncNotificationService::new(registry, events, pool)
    }

    fn prepare(self) -> (ChannelRegistry, Arc<EventPublisher>) {
        if let Some(policy) = self.retry.and_then(resolve_policy) {
            for channel in self.registry.channels() {
                if let Some(retryable) = channel.as_retryable() {
                    retryable.set_retry_executor(Some(RetryExecutor::new(policy.clone())));
                    debug!(
                        channel = %channel.channel_kind(),
                        max_attempts = policy.max_attempts(),
                        "Attached retry executor"
                    );
                }
            }
        }

        let events = EventPublisher::new_shared();
        if self.log_events {
            events.subscribe(Arc::new(LoggingListener));
        }
        for listener in self.listeners {
            events.subscribe(listener);
        }
        (self.registry, events)
    }
}

fn resolve_policy(setting: RetrySetting) -> Option<Arc<dyn RetryPolicy>> {
    match setting {
        RetrySetting::Policy(policy) => Some(policy),
        RetrySetting::Config(config) => match config.validate() {
            Ok(()) => Some(Arc::new(ExponentialBackoffRetry::new(config))),
            Err(e) => {
                warn!(error = %e, "Invalid retry configuration, retry disabled");
                None
            }
        },
    }
}

impl Default for NotificationServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationServiceBuilder")
            .field("registry", &self.registry)
            .field("mode", &self.mode)
            .field("pool", &self.pool)
            .field("listeners", &self.listeners.len())
            .field("log_events", &self.log_events)
            .finish_non_exhaustive()
    }
}
