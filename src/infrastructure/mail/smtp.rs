use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    errors::DeliveryError,
    settings::{SmtpConfig, SmtpTls},
};

/// SMTP reply codes that mean the server refused our credentials.
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from_display: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html_body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, config: &SmtpConfig, email: OutgoingEmail) -> Result<(), DeliveryError>;
}

/// Delivers over a fresh authenticated SMTP session per message.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn build_message(config: &SmtpConfig, email: &OutgoingEmail) -> Result<Message, DeliveryError> {
        let from_address = config
            .from_address
            .parse()
            .map_err(|e| DeliveryError::Message(format!("invalid sender address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| DeliveryError::Message(format!("invalid recipient address: {}", e)))?;

        let mut builder = Message::builder()
            .from(Mailbox::new(Some(email.from_display.clone()), from_address))
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = &email.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| DeliveryError::Message(format!("invalid reply-to address: {}", e)))?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(email.html_body.clone())
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }

    fn build_transport(&self, config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = match config.tls {
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| DeliveryError::Tls(e.to_string()))?,
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| DeliveryError::Tls(e.to_string()))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        Ok(builder
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.to_string()))
            .timeout(Some(self.timeout))
            .build())
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, config: &SmtpConfig, email: OutgoingEmail) -> Result<(), DeliveryError> {
        let message = Self::build_message(config, &email)?;
        let transport = self.build_transport(config)?;

        match tokio::time::timeout(self.timeout, transport.send(message)).await {
            Ok(Ok(response)) => {
                tracing::debug!(code = %response.code(), to = %email.to, "SMTP server accepted message");
                Ok(())
            }
            Ok(Err(e)) => Err(classify(e, self.timeout)),
            Err(_) => Err(DeliveryError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Sorts a lettre failure into the buckets the handler maps to HTTP statuses.
fn classify(err: SmtpError, timeout: Duration) -> DeliveryError {
    let detail = err.to_string();

    if err.is_timeout() {
        return DeliveryError::Timeout(timeout.as_secs());
    }
    if err.is_tls() {
        return DeliveryError::Tls(detail);
    }
    if let Some(code) = err.status() {
        let code = code.to_string();
        if AUTH_FAILURE_CODES.contains(&code.as_str()) {
            return DeliveryError::Authentication(detail);
        }
        return DeliveryError::Rejected(detail);
    }
    if err.is_client() || err.is_response() {
        return DeliveryError::Protocol(detail);
    }
    DeliveryError::Connection(detail)
}
