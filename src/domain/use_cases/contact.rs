use std::sync::Arc;

use chrono::Utc;

use crate::{
    entities::contact::{ContactResponse, ContactSubmission},
    errors::AppError,
    mail::{smtp::{MailSender, OutgoingEmail}, templates::EmailRenderer},
    notifications::worker::{NotificationJob, NotificationQueue},
    settings::{EnvSource, SmtpConfig},
};

pub struct ContactHandler {
    mailer: Arc<dyn MailSender>,
    renderer: Arc<EmailRenderer>,
    env: Arc<dyn EnvSource>,
    notifications: NotificationQueue,
}

impl ContactHandler {
    pub fn new(
        mailer: Arc<dyn MailSender>,
        renderer: Arc<EmailRenderer>,
        env: Arc<dyn EnvSource>,
        notifications: NotificationQueue,
    ) -> Self {
        ContactHandler { mailer, renderer, env, notifications }
    }

    /// Validates a submission and relays it to the configured inbox.
    /// Notifications are queued only after the primary email went out.
    pub async fn relay(
        &self,
        raw: ContactSubmission,
        client_ip: &str,
    ) -> Result<ContactResponse, AppError> {
        let submission = raw.into_validated().inspect_err(|e| {
            tracing::info!(client_ip, "Rejected submission: {}", e);
        })?;

        let smtp = SmtpConfig::from_source(self.env.as_ref()).inspect_err(|e| {
            tracing::error!("SMTP configuration unusable: {}", e);
        })?;

        let received_at = Utc::now();
        let html_body = self.renderer.render_contact(&submission, client_ip, received_at)?;

        let email = OutgoingEmail {
            from_display: self.renderer.site_name().to_string(),
            to: smtp.to_email.clone(),
            reply_to: Some(submission.email.clone()),
            subject: format!("New contact message from {} - {}", submission.name, self.renderer.site_name()),
            html_body,
        };

        if let Err(e) = self.mailer.send(&smtp, email).await {
            tracing::error!(client_ip, kind = e.kind(), "Email delivery failed: {}", e);
            return Err(e.into());
        }
        tracing::info!(client_ip, "Contact email delivered");

        self.notifications.enqueue(NotificationJob {
            submission,
            client_ip: client_ip.to_string(),
            smtp,
            received_at,
        });

        Ok(ContactResponse::sent())
    }
}
