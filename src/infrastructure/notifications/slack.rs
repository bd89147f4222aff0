use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::{errors::NotificationError, notifications::worker::NotificationJob};

#[derive(Debug, Serialize)]
pub struct SlackMessage {
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
    pub attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
pub struct SlackAttachment {
    pub color: String,
    pub title: String,
    pub text: String,
    pub fields: Vec<SlackField>,
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl SlackField {
    fn new(title: &str, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
            short,
        }
    }
}

/// Posts new submissions to an incoming webhook.
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Url,
    channel: String,
    username: String,
}

impl SlackNotifier {
    pub fn new(
        webhook_url: Url,
        channel: impl Into<String>,
        site_name: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
            channel: channel.into(),
            username: format!("{} Bot", site_name),
        })
    }

    pub fn build_message(&self, job: &NotificationJob) -> SlackMessage {
        let submission = &job.submission;
        SlackMessage {
            channel: self.channel.clone(),
            username: self.username.clone(),
            icon_emoji: ":email:".to_string(),
            attachments: vec![SlackAttachment {
                color: "good".to_string(),
                title: "New contact message".to_string(),
                text: "A new message was received from the website".to_string(),
                fields: vec![
                    SlackField::new("Name", submission.name.as_str(), true),
                    SlackField::new("Email", submission.email.as_str(), true),
                    SlackField::new("IP", job.client_ip.as_str(), true),
                    SlackField::new("Date", job.received_at.format("%Y-%m-%d %H:%M:%S").to_string(), true),
                    SlackField::new("Message", submission.message.as_str(), false),
                ],
                timestamp: job.received_at.timestamp(),
            }],
        }
    }

    pub async fn notify(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&self.build_message(job))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::SlackStatus(status.as_u16()));
        }

        tracing::info!(target: "notifications", "Slack notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entities::contact::ContactSubmission, settings::{SmtpConfig, SmtpTls}};
    use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use zeroize::Zeroizing;

    fn job() -> NotificationJob {
        NotificationJob {
            submission: ContactSubmission::new("Jane Doe", "jane@example.com", "Hello, I am interested."),
            client_ip: "203.0.113.7".into(),
            smtp: SmtpConfig {
                host: "smtp.example.com".into(),
                port: 587,
                user: "relay@example.com".into(),
                pass: Zeroizing::new("secret".into()),
                from_address: "relay@example.com".into(),
                to_email: "inbox@example.com".into(),
                tls: SmtpTls::StartTls,
            },
            received_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    fn notifier(url: &str) -> SlackNotifier {
        SlackNotifier::new(Url::parse(url).unwrap(), "#contact", "Acme", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn payload_lists_submission_fields() {
        let message = notifier("https://hooks.slack.com/services/T/B/X").build_message(&job());
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["channel"], "#contact");
        assert_eq!(json["username"], "Acme Bot");
        let attachment = &json["attachments"][0];
        assert_eq!(attachment["ts"], 1741944413);
        let titles: Vec<_> = attachment["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["Name", "Email", "IP", "Date", "Message"]);
        assert_eq!(attachment["fields"][2]["value"], "203.0.113.7");
        assert_eq!(attachment["fields"][4]["short"], false);
    }

    /// Local webhook that answers every POST with `status` and keeps the bodies.
    fn spawn_webhook(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&received);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = HttpServer::new(move || {
            let recorder = Arc::clone(&recorder);
            App::new().route(
                "/hook",
                web::post().to(move |body: web::Json<serde_json::Value>| {
                    let recorder = Arc::clone(&recorder);
                    async move {
                        recorder.lock().push(body.into_inner());
                        HttpResponse::build(status).finish()
                    }
                }),
            )
        })
        .listen(listener)
        .unwrap()
        .workers(1)
        .run();
        tokio::spawn(server);

        (format!("http://127.0.0.1:{}/hook", port), received)
    }

    #[actix_rt::test]
    async fn successful_post_delivers_payload() {
        let (url, received) = spawn_webhook(StatusCode::OK);

        notifier(&url).notify(&job()).await.unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["channel"], "#contact");
        assert_eq!(received[0]["attachments"][0]["fields"][0]["value"], "Jane Doe");
        assert_eq!(received[0]["attachments"][0]["ts"], 1741944413);
    }

    #[actix_rt::test]
    async fn non_success_status_is_an_error() {
        let (url, received) = spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR);

        let result = notifier(&url).notify(&job()).await;

        assert!(matches!(result, Err(NotificationError::SlackStatus(500))));
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_an_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = notifier(&format!("http://127.0.0.1:{}/hook", port)).notify(&job()).await;

        assert!(matches!(result, Err(NotificationError::SlackRequest(_))));
    }
}
