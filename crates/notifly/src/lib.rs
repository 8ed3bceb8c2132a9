pub mod builder;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod provider;
pub mod retry;
pub mod service;
pub mod telemetry;
pub mod types;
pub mod validation;

pub use builder::NotificationServiceBuilder;
pub use channel::{
    ChannelRegistry, DeliveryChannel, DispatchContext, NotificationChannel, RetryableChannel,
};
pub use config::{ExecutionMode, PoolConfig, ServiceConfig};
pub use error::{ConfigError, DispatchError, ProviderError, ValidationError};
pub use events::{
    EventPublisher, LoggingListener, NotificationEvent, NotificationEventListener, SubscriptionId,
};
pub use provider::NotificationProvider;
pub use retry::{ExponentialBackoffRetry, RetryConfig, RetryExecutor, RetryPolicy};
pub use service::{
    AsyncNotificationService, BatchHandle, DispatchHandle, NotificationService,
    SyncNotificationService,
};
pub use types::*;
pub use validation::{EmailValidator, NotificationValidator, PhoneValidator, ValidatorSet};
