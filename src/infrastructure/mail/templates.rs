use chrono::{DateTime, Datelike, Utc};
use minijinja::{context, Environment, Value};

use crate::entities::contact::ContactSubmission;

const CONTACT_TEMPLATE: &str = "contact_email.html";
const AUTO_REPLY_TEMPLATE: &str = "auto_reply.html";

/// HTML bodies for outgoing mail.
///
/// Templates are registered under `.html` names, so the engine auto-escapes
/// every interpolated value. Submission fields have already been escaped by
/// the sanitizer and are passed through as safe strings to avoid escaping twice.
pub struct EmailRenderer {
    env: Environment<'static>,
    site_name: String,
}

impl EmailRenderer {
    pub fn new(site_name: impl Into<String>) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(CONTACT_TEMPLATE, include_str!("templates/contact_email.html"))?;
        env.add_template(AUTO_REPLY_TEMPLATE, include_str!("templates/auto_reply.html"))?;

        Ok(Self {
            env,
            site_name: site_name.into(),
        })
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn render_contact(
        &self,
        submission: &ContactSubmission,
        client_ip: &str,
        received_at: DateTime<Utc>,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template(CONTACT_TEMPLATE)?.render(context! {
            name => Value::from_safe_string(submission.name.clone()),
            email => Value::from_safe_string(submission.email.clone()),
            message => Value::from_safe_string(submission.message.clone()),
            client_ip => client_ip,
            timestamp => received_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            year => received_at.year(),
            site_name => &self.site_name,
        })
    }

    pub fn render_auto_reply(&self, submission: &ContactSubmission) -> Result<String, minijinja::Error> {
        self.env.get_template(AUTO_REPLY_TEMPLATE)?.render(context! {
            name => Value::from_safe_string(submission.name.clone()),
            message => Value::from_safe_string(submission.message.clone()),
            site_name => &self.site_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    fn submission() -> ContactSubmission {
        ContactSubmission::new(
            "Jane Doe",
            "jane@example.com",
            "Hello, I want <b>bold</b> & \"quoted\" answers.",
        )
        .into_validated()
        .unwrap()
    }

    #[test]
    fn contact_email_contains_submission_details() {
        let renderer = EmailRenderer::new("Acme").unwrap();

        let html = renderer.render_contact(&submission(), "203.0.113.7", received_at()).unwrap();

        assert!(html.contains("Jane Doe"));
        assert!(html.contains("jane@example.com"));
        assert!(html.contains("203.0.113.7"));
        assert!(html.contains("2025-03-14 09:26:53 UTC"));
        assert!(html.contains("&copy; 2025 Acme"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt; &amp; &quot;quoted&quot;"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(!html.contains("&amp;lt;"));
    }

    #[test]
    fn non_submission_values_are_auto_escaped() {
        let renderer = EmailRenderer::new("Acme").unwrap();

        let html = renderer.render_contact(&submission(), "<script>", received_at()).unwrap();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn auto_reply_greets_the_submitter() {
        let renderer = EmailRenderer::new("Acme").unwrap();

        let html = renderer.render_auto_reply(&submission()).unwrap();

        assert!(html.contains("Hi <strong>Jane Doe</strong>"));
        assert!(html.contains("The Acme team"));
    }
}
