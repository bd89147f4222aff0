use std::sync::Arc;

use crate::{
    errors::NotificationError,
    mail::{smtp::{MailSender, OutgoingEmail}, templates::EmailRenderer},
    notifications::worker::NotificationJob,
};

/// Sends the submitter a confirmation that their message arrived.
#[derive(Clone)]
pub struct AutoResponder {
    mailer: Arc<dyn MailSender>,
    renderer: Arc<EmailRenderer>,
}

impl AutoResponder {
    pub fn new(mailer: Arc<dyn MailSender>, renderer: Arc<EmailRenderer>) -> Self {
        Self { mailer, renderer }
    }

    pub async fn respond(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let html_body = self
            .renderer
            .render_auto_reply(&job.submission)
            .map_err(|e| NotificationError::AutoResponseRender(e.to_string()))?;

        let site_name = self.renderer.site_name();
        let email = OutgoingEmail {
            from_display: site_name.to_string(),
            to: job.submission.email.clone(),
            reply_to: None,
            subject: format!("Thanks for contacting {}", site_name),
            html_body,
        };

        self.mailer
            .send(&job.smtp, email)
            .await
            .map_err(NotificationError::AutoResponseDelivery)?;

        tracing::info!(target: "notifications", "Auto-response sent");
        Ok(())
    }
}
