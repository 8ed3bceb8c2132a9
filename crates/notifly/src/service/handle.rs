//! Completion handles returned by `send_async` and `send_async_batch`.
//!
//! A handle can be waited on from plain threads (`wait`) or awaited from
//! async code. `wait` blocks the calling thread and must not be called
//! from inside an async task.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::types::NotificationResult;

pub type DispatchOutcome = Result<NotificationResult, DispatchError>;

enum State {
    /// Completed before the handle was created; `None` once taken.
    Ready(Option<DispatchOutcome>),
    Waiting(oneshot::Receiver<DispatchOutcome>),
}

/// Completion handle for one dispatch.
///
/// The outcome is exactly what the synchronous `send` would have returned.
/// If the worker running the dispatch goes away without reporting (the
/// service was dropped mid-flight), the outcome is `DispatchError::Cancelled`.
pub struct DispatchHandle {
    correlation_id: Option<String>,
    state: State,
    cancel: CancellationToken,
}

impl DispatchHandle {
    pub(crate) fn ready(correlation_id: Option<String>, outcome: DispatchOutcome) -> Self {
        Self {
            correlation_id,
            state: State::Ready(Some(outcome)),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn waiting(
        correlation_id: String,
        receiver: oneshot::Receiver<DispatchOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            state: State::Waiting(receiver),
            cancel,
        }
    }

    /// Correlation id shared by every event of this dispatch.
    ///
    /// `None` for dispatches rejected before an id was assigned.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Interrupt any pending retry wait. The dispatch still finishes and
    /// publishes its terminal event; an attempt already running is not
    /// aborted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block the current thread until the dispatch completes.
    pub fn wait(self) -> DispatchOutcome {
        match self.state {
            State::Ready(outcome) => outcome.unwrap_or(Err(DispatchError::Cancelled)),
            State::Waiting(receiver) => receiver
                .blocking_recv()
                .unwrap_or(Err(DispatchError::Cancelled)),
        }
    }
}

impl Future for DispatchHandle {
    type Output = DispatchOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(Err(DispatchError::Cancelled)))
            }
            State::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|r| r.unwrap_or(Err(DispatchError::Cancelled))),
        }
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Ready(_) => "ready",
            State::Waiting(_) => "waiting",
        };
        f.debug_struct("DispatchHandle")
            .field("correlation_id", &self.correlation_id)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Completion handle for a batch, resolving once every request is done.
///
/// Succeeds with results in request order when every dispatch succeeded.
/// Otherwise fails with `DispatchError::Batch`, which carries all outcomes.
#[derive(Debug)]
pub struct BatchHandle {
    handles: Vec<DispatchHandle>,
}

impl BatchHandle {
    pub(crate) fn new(handles: Vec<DispatchHandle>) -> Self {
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Correlation ids in request order.
    pub fn correlation_ids(&self) -> Vec<Option<&str>> {
        self.handles.iter().map(|h| h.correlation_id()).collect()
    }

    /// Cancel the retry waits of every request in the batch.
    pub fn cancel(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// Block until every request completes.
    pub fn wait(self) -> Result<Vec<NotificationResult>, DispatchError> {
        let outcomes = self.handles.into_iter().map(DispatchHandle::wait).collect();
        collect_outcomes(outcomes)
    }
}

impl IntoFuture for BatchHandle {
    type Output = Result<Vec<NotificationResult>, DispatchError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        async move { collect_outcomes(join_all(self.handles).await) }.boxed()
    }
}

fn collect_outcomes(
    outcomes: Vec<DispatchOutcome>,
) -> Result<Vec<NotificationResult>, DispatchError> {
    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed == 0 {
        return Ok(outcomes.into_iter().flatten().collect());
    }
    Err(DispatchError::Batch {
        failed,
        total: outcomes.len(),
        outcomes,
    })
}
