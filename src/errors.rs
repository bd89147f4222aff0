use std::fmt;

use actix_web::{
    error::ResponseError,
    http::{header::{self, ContentType}, StatusCode},
    HttpResponse
};
use chrono::Utc;
use derive_more::Display;
use serde::Serialize;
use validator::ValidationErrors;

/// Order in which field errors are reported back to the client.
const FIELD_ORDER: [&str; 3] = ["name", "email", "message"];

#[derive(Debug)]
pub enum AppError {
    ValidationError(Vec<FieldError>),
    BadRequest(String),
    ForbiddenOrigin(String),
    MethodNotAllowed,
    UnauthorizedAccess,
    RateLimited { retry_after_secs: u64 },
    Configuration(ConfigurationError),
    Delivery(DeliveryError),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(errors) => {
                let messages = errors.iter()
                    .map(|e| format!("{}:{}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "validation error: {}", messages)
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ForbiddenOrigin(origin) => write!(f, "Origin not allowed: {}", origin),
            AppError::MethodNotAllowed => write!(f, "Method not allowed"),
            AppError::UnauthorizedAccess => write!(f, "Unauthorized access"),
            AppError::RateLimited { retry_after_secs } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after_secs)
            }
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Delivery(e) => write!(f, "Delivery error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal server error: {}", msg)
        }
    }
}

impl AppError {
    /// Message safe to show to the submitter. Server-side faults never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "Validation failed".to_string()),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::ForbiddenOrigin(_) => "Origin not allowed".to_string(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::UnauthorizedAccess => "Unauthorized".to_string(),
            AppError::RateLimited { retry_after_secs } => format!(
                "Too many requests. Please try again in {}.",
                humanize_wait(*retry_after_secs)
            ),
            AppError::Configuration(_) => {
                "Server configuration error while sending the email. Please contact the administrator.".to_string()
            }
            AppError::Delivery(e) if e.is_unavailable() => {
                "The email service is temporarily unavailable. Please try again later.".to_string()
            }
            AppError::Delivery(_) => {
                "The email could not be sent. Please try again later.".to_string()
            }
            AppError::InternalError(_) => "Internal server error".to_string(),
        }
    }
}

fn humanize_wait(secs: u64) -> String {
    match secs {
        0..=1 => "1 second".to_string(),
        2..=59 => format!("{} seconds", secs),
        60..=119 => "1 minute".to_string(),
        _ => format!("{} minutes", secs.div_ceil(60)),
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.public_message(),
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
        });
        if let AppError::ValidationError(errors) = self {
            body["details"] = serde_json::json!(errors);
        }

        let mut builder = HttpResponse::build(status);
        builder.insert_header(ContentType::json());
        if let AppError::RateLimited { retry_after_secs } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ForbiddenOrigin(_) => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UnauthorizedAccess => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Delivery(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(|e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                })
            })
            .collect();

        field_errors.sort_by_key(|e| {
            FIELD_ORDER
                .iter()
                .position(|f| *f == e.field)
                .unwrap_or(FIELD_ORDER.len())
        });

        AppError::ValidationError(field_errors)
    }
}

impl From<ConfigurationError> for AppError {
    fn from(err: ConfigurationError) -> Self {
        AppError::Configuration(err)
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        AppError::Delivery(err)
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::InternalError(format!("Template error: {}", err))
    }
}

/// Missing or malformed SMTP settings, discovered at request time.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[display("missing environment variables: {}", _0.join(", "))]
    MissingVariables(Vec<&'static str>),

    #[display("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// SMTP delivery failures, classified for logging and status mapping.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[display("connection failed: {_0}")]
    Connection(String),

    #[display("timed out after {_0}s")]
    Timeout(u64),

    #[display("TLS failure: {_0}")]
    Tls(String),

    #[display("authentication failed: {_0}")]
    Authentication(String),

    #[display("rejected by server: {_0}")]
    Rejected(String),

    #[display("SMTP protocol error: {_0}")]
    Protocol(String),

    #[display("could not build message: {_0}")]
    Message(String),
}

impl DeliveryError {
    /// Transport-level failures where the upstream is unreachable rather than refusing us.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Connection(_) | DeliveryError::Timeout(_) | DeliveryError::Tls(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Connection(_) => "connection",
            DeliveryError::Timeout(_) => "timeout",
            DeliveryError::Tls(_) => "tls",
            DeliveryError::Authentication(_) => "authentication",
            DeliveryError::Rejected(_) => "rejected",
            DeliveryError::Protocol(_) => "protocol",
            DeliveryError::Message(_) => "message",
        }
    }
}

/// Best-effort fan-out failures. Only ever logged.
#[derive(Debug, Display)]
pub enum NotificationError {
    #[display("Slack request failed: {_0}")]
    SlackRequest(String),

    #[display("Slack responded with status {_0}")]
    SlackStatus(u16),

    #[display("Auto-response render failed: {_0}")]
    AutoResponseRender(String),

    #[display("Auto-response delivery failed: {_0}")]
    AutoResponseDelivery(DeliveryError),
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::SlackRequest(err.to_string())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}
