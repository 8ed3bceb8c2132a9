//! Retry with exponential backoff.
//!
//! - [`config`]: `RetryConfig`, validated once when a service is built
//! - [`policy`]: `RetryPolicy` trait and `ExponentialBackoffRetry`
//! - [`executor`]: `RetryExecutor`, which drives a provider under a policy

pub mod config;
pub mod executor;
pub mod policy;

pub use config::RetryConfig;
pub use executor::RetryExecutor;
pub use policy::{ExponentialBackoffRetry, RetryPolicy};
