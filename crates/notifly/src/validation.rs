//! Pre-dispatch request validation.
//!
//! Validation is opt-in: callers run a [`ValidatorSet`] before handing a
//! request to a service. Dispatch itself never re-validates.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::types::{ChannelKind, NotificationRequest};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.[A-Za-z]{2,}$",
    )
    .expect("Invalid email regex")
});

// E.164-like: optional plus, 7 to 15 digits, no leading zero
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+]?[1-9]\d{6,14}$").expect("Invalid phone regex"));

static PHONE_FORMATTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-()]").expect("Invalid phone formatting regex"));

pub trait NotificationValidator: Send + Sync {
    fn validate(&self, request: &NotificationRequest) -> Result<(), ValidationError>;

    fn supports(&self, channel: ChannelKind) -> bool;
}

/// Email address, subject (≤ 255 chars) and message (≤ 10000 chars).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailValidator;

impl EmailValidator {
    pub const MAX_SUBJECT_LENGTH: usize = 255;
    pub const MAX_MESSAGE_LENGTH: usize = 10_000;
}

impl NotificationValidator for EmailValidator {
    fn validate(&self, request: &NotificationRequest) -> Result<(), ValidationError> {
        if request.channel != ChannelKind::Email {
            return Err(ValidationError::new("Request channel must be EMAIL"));
        }

        let recipient = request.recipient.as_str();
        if recipient.trim().is_empty() {
            return Err(ValidationError::new("Email recipient is required"));
        }
        if !EMAIL_REGEX.is_match(recipient) {
            return Err(ValidationError::new(format!(
                "Invalid email format: {recipient}"
            )));
        }

        required_within(
            request.subject.as_deref(),
            Self::MAX_SUBJECT_LENGTH,
            "Email subject",
        )?;
        required_within(
            request.message.as_deref(),
            Self::MAX_MESSAGE_LENGTH,
            "Email message",
        )
    }

    fn supports(&self, channel: ChannelKind) -> bool {
        channel == ChannelKind::Email
    }
}

/// Phone number (formatting characters ignored) and message (≤ 1600 chars).
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneValidator;

impl PhoneValidator {
    pub const MAX_MESSAGE_LENGTH: usize = 1_600;
}

impl NotificationValidator for PhoneValidator {
    fn validate(&self, request: &NotificationRequest) -> Result<(), ValidationError> {
        if request.channel != ChannelKind::Sms {
            return Err(ValidationError::new("Request channel must be SMS"));
        }

        let recipient = request.recipient.as_str();
        if recipient.trim().is_empty() {
            return Err(ValidationError::new("SMS recipient phone number is required"));
        }
        let cleaned = PHONE_FORMATTING.replace_all(recipient, "");
        if !PHONE_REGEX.is_match(&cleaned) {
            return Err(ValidationError::new(format!(
                "Invalid phone number format: {recipient}. \
                 Expected format: +[country code][number] or [country code][number]"
            )));
        }

        required_within(
            request.message.as_deref(),
            Self::MAX_MESSAGE_LENGTH,
            "SMS message",
        )
    }

    fn supports(&self, channel: ChannelKind) -> bool {
        channel == ChannelKind::Sms
    }
}

fn required_within(value: Option<&str>, max: usize, field: &str) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => {
            if v.chars().count() > max {
                Err(ValidationError::new(format!(
                    "{field} exceeds maximum length of {max} characters"
                )))
            } else {
                Ok(())
            }
        }
        _ => Err(ValidationError::new(format!("{field} is required"))),
    }
}

/// Runs every validator that supports the request's channel.
pub struct ValidatorSet {
    validators: Vec<Box<dyn NotificationValidator>>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Email and phone validators.
    pub fn builtin() -> Self {
        Self::new().with(EmailValidator).with(PhoneValidator)
    }

    pub fn with(mut self, validator: impl NotificationValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Channels without a supporting validator pass unchecked.
    pub fn validate(&self, request: &NotificationRequest) -> Result<(), ValidationError> {
        self.validators
            .iter()
            .filter(|v| v.supports(request.channel))
            .try_for_each(|v| v.validate(request))
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl Default for ValidatorSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ValidatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorSet")
            .field("validators", &self.validators.len())
            .finish()
    }
}
