//! Notification lifecycle events.
//!
//! ```text
//!   dispatch ──► EventPublisher::publish(&event)
//!                        │ (snapshot of listeners)
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │Listener 1│  │Listener 2│  │Listener 3│
//!    └──────────┘  └──────────┘  └──────────┘
//! ```
//!
//! - [`types`]: `NotificationEvent`
//! - [`listener`]: `NotificationEventListener` trait and `LoggingListener`
//! - [`publisher`]: `EventPublisher` with error and panic isolation

pub mod listener;
pub mod publisher;
pub mod types;

pub use listener::{LoggingListener, NotificationEventListener};
pub use publisher::{EventPublisher, SubscriptionId};
pub use types::NotificationEvent;
