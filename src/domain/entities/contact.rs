use std::borrow::Cow;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{errors::AppError, utils::sanitize::sanitize};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_MESSAGE_LENGTH: usize = 10;
pub const MAX_MESSAGE_LENGTH: usize = 2000;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\p{M} ]+$").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// A contact form submission. Missing fields decode as empty strings and are
/// reported by validation, not by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct ContactSubmission {
    #[serde(default)]
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = "validate_email"))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "validate_message"))]
    pub message: String,
}

impl ContactSubmission {
    pub fn new(name: impl Into<String>, email: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            message: message.into(),
        }
    }

    pub fn sanitized(&self) -> Self {
        Self {
            name: sanitize(&self.name),
            email: sanitize(&self.email),
            message: sanitize(&self.message),
        }
    }

    /// Sanitizes every field, then validates the result. All three fields are
    /// checked; each reports only its first failing rule.
    pub fn into_validated(self) -> Result<Self, AppError> {
        let clean = self.sanitized();
        clean.validate()?;
        Ok(clean)
    }
}

fn rule(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(rule("required", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(rule("length", format!("Name cannot exceed {} characters", MAX_NAME_LENGTH)));
    }
    if !NAME_RE.is_match(name) {
        return Err(rule("charset", "Name can only contain letters and spaces"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(rule("required", "Email is required"));
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(rule("length", format!("Email cannot exceed {} characters", MAX_EMAIL_LENGTH)));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(rule("email", "Email format is not valid"));
    }
    Ok(())
}

fn validate_message(message: &str) -> Result<(), ValidationError> {
    let len = message.chars().count();
    if len == 0 {
        return Err(rule("required", "Message is required"));
    }
    if len < MIN_MESSAGE_LENGTH {
        return Err(rule(
            "too_short",
            format!("Message is too short, it must be at least {} characters", MIN_MESSAGE_LENGTH),
        ));
    }
    if len > MAX_MESSAGE_LENGTH {
        return Err(rule("too_long", format!("Message cannot exceed {} characters", MAX_MESSAGE_LENGTH)));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub status: u16,
}

impl ContactResponse {
    pub fn sent() -> Self {
        Self {
            message: "Message sent successfully! We will get back to you soon.".to_string(),
            timestamp: Utc::now(),
            status: 200,
        }
    }
}
