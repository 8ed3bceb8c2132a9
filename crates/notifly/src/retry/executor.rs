use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::policy::RetryPolicy;
use crate::channel::DispatchContext;
use crate::error::ProviderError;
use crate::provider::NotificationProvider;
use crate::types::{NotificationRequest, NotificationResult};

/// Runs `provider.send` repeatedly under a [`RetryPolicy`].
///
/// Exhausted failures come back in two shapes:
/// - an unsuccessful `NotificationResult` returned by the provider is
///   returned as `Ok(result)`
/// - a `ProviderError` raised by the provider is re-raised as `Err`
///
/// The retry wait is the only intentional suspension point. It is cut short
/// when the dispatch context is cancelled, which stops retrying immediately.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: Arc<dyn RetryPolicy>,
}

enum Wait {
    Elapsed,
    Interrupted,
}

impl RetryExecutor {
    pub fn new(policy: Arc<dyn RetryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.policy
    }

    /// Send via the provider, retrying on failure until success, policy
    /// refusal or cancellation.
    ///
    /// The returned result is stamped with the attempt that produced it;
    /// the provider's own attempt number is ignored.
    pub async fn execute_with_retry(
        &self,
        provider: &dyn NotificationProvider,
        request: &NotificationRequest,
        ctx: &DispatchContext,
    ) -> Result<NotificationResult, ProviderError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        while attempt <= max_attempts {
            debug!(
                correlation_id = %ctx.correlation_id(),
                provider = %provider.name(),
                attempt,
                max_attempts,
                "Sending notification"
            );

            match provider.send(request).await {
                Ok(result) => {
                    let result = result.with_attempt(attempt);
                    if result.is_success() {
                        info!(
                            correlation_id = %ctx.correlation_id(),
                            provider = %provider.name(),
                            attempt,
                            "Notification sent"
                        );
                        return Ok(result);
                    }

                    if attempt >= max_attempts || !self.policy.should_retry(&result, attempt) {
                        warn!(
                            correlation_id = %ctx.correlation_id(),
                            attempt,
                            "Not retrying: max attempts reached or retry disabled"
                        );
                        return Ok(result);
                    }

                    if let Wait::Interrupted = self.wait_before(attempt + 1, ctx).await {
                        return Ok(NotificationResult::failed_after(
                            provider.name(),
                            attempt,
                            "Retry interrupted",
                        ));
                    }
                }
                Err(err) => {
                    warn!(
                        correlation_id = %ctx.correlation_id(),
                        attempt,
                        error = %err,
                        "Provider error"
                    );

                    let failure =
                        NotificationResult::failed_after(provider.name(), attempt, &err.message);
                    if attempt >= max_attempts || !self.policy.should_retry(&failure, attempt) {
                        error!(
                            correlation_id = %ctx.correlation_id(),
                            attempts = attempt,
                            "Failed to send notification"
                        );
                        return Err(err);
                    }

                    if let Wait::Interrupted = self.wait_before(attempt + 1, ctx).await {
                        return Err(err);
                    }
                }
            }

            // attempt < max_attempts here, so this cannot overflow
            attempt += 1;
            ctx.notify_retrying(attempt);
        }

        // Only reachable with a policy that allows zero attempts
        error!(
            correlation_id = %ctx.correlation_id(),
            max_attempts,
            "No attempt was made"
        );
        Ok(NotificationResult::failed_after(
            provider.name(),
            attempt,
            "All retry attempts exhausted",
        ))
    }

    async fn wait_before(&self, next_attempt: u32, ctx: &DispatchContext) -> Wait {
        let delay = self.policy.delay_before_attempt(next_attempt);
        if ctx.is_cancelled() {
            warn!(correlation_id = %ctx.correlation_id(), "Retry cancelled");
            return Wait::Interrupted;
        }
        if delay == Duration::ZERO {
            return Wait::Elapsed;
        }

        info!(
            correlation_id = %ctx.correlation_id(),
            delay_ms = delay.as_millis() as u64,
            next_attempt,
            "Waiting before retry"
        );

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                warn!(correlation_id = %ctx.correlation_id(), "Retry delay interrupted");
                Wait::Interrupted
            }
            _ = tokio::time::sleep(delay) => Wait::Elapsed,
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.policy.max_attempts())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPublisher, NotificationEvent};
    use crate::retry::{ExponentialBackoffRetry, RetryConfig};
    use crate::types::NotificationStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    enum Outcome {
        Sent,
        Failed,
        Error,
    }

    /// Provider that replays a script, repeating the last outcome.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Outcome>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Outcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationProvider for ScriptedProvider {
        async fn send(
            &self,
            _request: &NotificationRequest,
        ) -> Result<NotificationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    match script.front().unwrap() {
                        Outcome::Sent => Outcome::Sent,
                        Outcome::Failed => Outcome::Failed,
                        Outcome::Error => Outcome::Error,
                    }
                }
            };
            match outcome {
                // Attempt number 99 must be overwritten by the executor
                Outcome::Sent => Ok(NotificationResult::sent("Scripted", "ok").with_attempt(99)),
                Outcome::Failed => Ok(NotificationResult::failed("Scripted", "nope", "rejected")),
                Outcome::Error => Err(ProviderError::new("Scripted", "connection refused")),
            }
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(Arc::new(ExponentialBackoffRetry::new(RetryConfig {
            max_attempts,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retry_on_failure: true,
        })))
    }

    fn request() -> NotificationRequest {
        NotificationRequest::email("a@example.com", "Subject", "Body")
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let provider = ScriptedProvider::new(vec![Outcome::Sent]);
        let req = request();
        let result = executor(3)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempt_number(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_then_succeed() {
        let provider =
            ScriptedProvider::new(vec![Outcome::Failed, Outcome::Failed, Outcome::Sent]);
        let req = request();
        let started = tokio::time::Instant::now();
        let result = executor(3)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempt_number(), 3);
        assert_eq!(provider.calls(), 3);
        // 1000ms before attempt 2, 2000ms before attempt 3
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_failure_is_returned() {
        let provider = ScriptedProvider::new(vec![Outcome::Failed]);
        let req = request();
        let result = executor(3)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.status(), NotificationStatus::Failed);
        assert_eq!(result.attempt_number(), 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_provider_error_is_reraised() {
        let provider = ScriptedProvider::new(vec![Outcome::Error]);
        let req = request();
        let err = executor(2)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::new("Scripted", "connection refused"));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_success() {
        let provider = ScriptedProvider::new(vec![Outcome::Error, Outcome::Sent]);
        let req = request();
        let result = executor(3)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempt_number(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_retries() {
        let provider = ScriptedProvider::new(vec![Outcome::Failed, Outcome::Sent]);
        let req = request();
        let result = executor(1)
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_disabled_calls_once() {
        let provider = ScriptedProvider::new(vec![Outcome::Error]);
        let executor = RetryExecutor::new(Arc::new(ExponentialBackoffRetry::new(
            RetryConfig::default().with_retry_on_failure(false),
        )));
        let req = request();
        let result = executor
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await;

        assert!(result.is_err());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_stops_retrying() {
        let provider = ScriptedProvider::new(vec![Outcome::Failed]);
        let req = request();
        let token = CancellationToken::new();
        let ctx = DispatchContext::detached(&req).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            token.cancel();
        });

        let result = executor(5)
            .execute_with_retry(&provider, &req, &ctx)
            .await
            .unwrap();
        canceller.await.unwrap();

        assert!(!result.is_success());
        assert_eq!(result.error_details(), Some("Retry interrupted"));
        assert_eq!(result.attempt_number(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_reraises_provider_error() {
        let provider = ScriptedProvider::new(vec![Outcome::Error]);
        let req = request();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = DispatchContext::detached(&req).with_cancellation(token);

        let err = executor(5)
            .execute_with_retry(&provider, &req, &ctx)
            .await
            .unwrap_err();

        assert_eq!(err.provider, "Scripted");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_events_published_per_retry() {
        let publisher = EventPublisher::new_shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        publisher.subscribe(Arc::new(move |e: &NotificationEvent| {
            sink.lock().unwrap().push((e.status, e.attempt_number));
        }));

        let provider =
            ScriptedProvider::new(vec![Outcome::Failed, Outcome::Error, Outcome::Sent]);
        let req = request();
        let ctx = DispatchContext::new(
            "corr".to_string(),
            &req,
            CancellationToken::new(),
            publisher,
        );
        executor(3)
            .execute_with_retry(&provider, &req, &ctx)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (NotificationStatus::Retrying, 2),
                (NotificationStatus::Retrying, 3)
            ]
        );
    }

    struct ZeroAttemptPolicy;

    impl RetryPolicy for ZeroAttemptPolicy {
        fn should_retry(&self, _result: &NotificationResult, _attempt: u32) -> bool {
            false
        }

        fn delay_before_attempt(&self, _attempt: u32) -> Duration {
            Duration::ZERO
        }

        fn max_attempts(&self) -> u32 {
            0
        }
    }

    #[tokio::test]
    async fn test_zero_attempt_policy_never_calls_provider() {
        let provider = ScriptedProvider::new(vec![Outcome::Sent]);
        let req = request();
        let result = RetryExecutor::new(Arc::new(ZeroAttemptPolicy))
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.error_details(), Some("All retry attempts exhausted"));
        assert_eq!(provider.calls(), 0);
    }

    /// Always asks for another attempt, whatever its declared maximum.
    struct EagerPolicy {
        max_attempts: u32,
    }

    impl RetryPolicy for EagerPolicy {
        fn should_retry(&self, _result: &NotificationResult, _attempt: u32) -> bool {
            true
        }

        fn delay_before_attempt(&self, _attempt: u32) -> Duration {
            Duration::ZERO
        }

        fn max_attempts(&self) -> u32 {
            self.max_attempts
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_policy_counts_attempts() {
        let provider =
            ScriptedProvider::new(vec![Outcome::Failed, Outcome::Error, Outcome::Sent]);
        let req = request();
        let result = RetryExecutor::new(Arc::new(EagerPolicy {
            max_attempts: u32::MAX,
        }))
        .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
        .await
        .unwrap();

        assert!(result.is_success());
        assert_eq!(result.attempt_number(), 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_caps_eager_policy() {
        let provider = ScriptedProvider::new(vec![Outcome::Failed]);
        let req = request();
        let result = RetryExecutor::new(Arc::new(EagerPolicy { max_attempts: 2 }))
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap();

        // The provider's own failure comes back, not a synthesized one
        assert_eq!(result.error_details(), Some("rejected"));
        assert_eq!(result.attempt_number(), 2);
        assert_eq!(provider.calls(), 2);

        let provider = ScriptedProvider::new(vec![Outcome::Error]);
        let err = RetryExecutor::new(Arc::new(EagerPolicy { max_attempts: 2 }))
            .execute_with_retry(&provider, &req, &DispatchContext::detached(&req))
            .await
            .unwrap_err();
        assert_eq!(err.provider, "Scripted");
        assert_eq!(provider.calls(), 2);
    }
}
