//! Lifecycle event type published for every dispatch.

use serde::Serialize;
use time::OffsetDateTime;

use crate::types::{ChannelKind, NotificationResult, NotificationStatus};

/// Snapshot of a dispatch's status change.
///
/// A dispatch produces one `Pending` event, zero or more `Retrying` events
/// and exactly one terminal `Sent` or `Failed` event, all sharing the same
/// correlation id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    /// Per-dispatch unique token
    pub correlation_id: String,
    pub status: NotificationStatus,
    /// Final result, present on terminal events only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<NotificationResult>,
    pub channel: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// 0 for pending, otherwise the 1-based attempt this event refers to
    pub attempt_number: u32,
}

impl NotificationEvent {
    /// Create a "pending" event.
    pub fn pending(
        correlation_id: impl Into<String>,
        channel: ChannelKind,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: NotificationStatus::Pending,
            result: None,
            channel,
            recipient: Some(recipient.into()),
            timestamp: OffsetDateTime::now_utc(),
            attempt_number: 0,
        }
    }

    /// Create a "retrying" event for the attempt about to run.
    pub fn retrying(
        correlation_id: impl Into<String>,
        channel: ChannelKind,
        recipient: Option<String>,
        attempt_number: u32,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status: NotificationStatus::Retrying,
            result: None,
            channel,
            recipient,
            timestamp: OffsetDateTime::now_utc(),
            attempt_number,
        }
    }

    /// Create a "sent" event from a successful result.
    pub fn sent(
        correlation_id: impl Into<String>,
        channel: ChannelKind,
        recipient: Option<String>,
        result: NotificationResult,
    ) -> Self {
        Self::terminal(
            NotificationStatus::Sent,
            correlation_id.into(),
            channel,
            recipient,
            result,
        )
    }

    /// Create a "failed" event from a failed or synthesized result.
    pub fn failed(
        correlation_id: impl Into<String>,
        channel: ChannelKind,
        recipient: Option<String>,
        result: NotificationResult,
    ) -> Self {
        Self::terminal(
            NotificationStatus::Failed,
            correlation_id.into(),
            channel,
            recipient,
            result,
        )
    }

    fn terminal(
        status: NotificationStatus,
        correlation_id: String,
        channel: ChannelKind,
        recipient: Option<String>,
        result: NotificationResult,
    ) -> Self {
        Self {
            correlation_id,
            status,
            channel,
            recipient,
            timestamp: result.timestamp(),
            attempt_number: result.attempt_number(),
            result: Some(result),
        }
    }

    /// Check if this event ends its dispatch.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
