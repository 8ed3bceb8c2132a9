use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Delivery category a request is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Push,
}

impl ChannelKind {
    /// Returns the label used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    /// Only ever carried by events, never by a terminal result.
    Retrying,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Retrying => "retrying",
        }
    }

    /// True for statuses that end a dispatch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to send a notification.
///
/// Which optional fields matter depends on the channel: email reads
/// `subject` + `message`, SMS reads `message`, push reads `title` + `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub channel: ChannelKind,

    /// Email address, phone number or device token
    pub recipient: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl NotificationRequest {
    pub fn new(channel: ChannelKind, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            subject: None,
            message: None,
            title: None,
            body: None,
        }
    }

    pub fn email(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(ChannelKind::Email, recipient)
            .with_subject(subject)
            .with_message(message)
    }

    pub fn sms(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ChannelKind::Sms, recipient).with_message(message)
    }

    pub fn push(
        device_token: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(ChannelKind::Push, device_token)
            .with_title(title)
            .with_body(body)
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Outcome of a send attempt.
///
/// Fields are private so that `success` and `status` cannot disagree:
/// a successful result is always `Sent`, a failed one always `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationResult {
    success: bool,
    status: NotificationStatus,
    message: String,
    provider_name: String,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_details: Option<String>,
    /// 1-based
    attempt_number: u32,
}

impl NotificationResult {
    /// Successful delivery reported by `provider_name`.
    pub fn sent(provider_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            status: NotificationStatus::Sent,
            message: message.into(),
            provider_name: provider_name.into(),
            timestamp: OffsetDateTime::now_utc(),
            error_details: None,
            attempt_number: 1,
        }
    }

    /// Failed delivery reported by `provider_name`.
    pub fn failed(
        provider_name: impl Into<String>,
        message: impl Into<String>,
        error_details: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            status: NotificationStatus::Failed,
            message: message.into(),
            provider_name: provider_name.into(),
            timestamp: OffsetDateTime::now_utc(),
            error_details: Some(error_details.into()),
            attempt_number: 1,
        }
    }

    /// Failure synthesized by the retry executor or the dispatcher.
    pub(crate) fn failed_after(
        provider_name: impl Into<String>,
        attempt_number: u32,
        error_details: impl Into<String>,
    ) -> Self {
        Self::failed(
            provider_name,
            format!("Notification failed after {attempt_number} attempt(s)"),
            error_details,
        )
        .with_attempt(attempt_number)
    }

    /// Returns a copy stamped with the given attempt number.
    pub fn with_attempt(mut self, attempt_number: u32) -> Self {
        self.attempt_number = attempt_number;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn status(&self) -> NotificationStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }
}
