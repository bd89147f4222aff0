
use contact_relay::{errors::DeliveryError, settings::AppConfig};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use test_utils::*;

#[actix_rt::test]
async fn valid_submission_is_relayed_to_inbox() {
    let app = TestApp::spawn().await;

    let response = app.post_contact("203.0.113.7", &jane_doe()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        ALLOWED_ORIGIN
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Message sent successfully! We will get back to you soon.");
    assert_eq!(body["status"], 200);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to, "inbox@example.com");
    assert_eq!(email.reply_to.as_deref(), Some("jane@example.com"));
    assert_eq!(email.subject, "New contact message from Jane Doe - Acme");
    assert!(email.html_body.contains("Jane Doe"));
    assert!(email.html_body.contains("jane@example.com"));
    assert!(email.html_body.contains("203.0.113.7"));
    assert!(email.html_body.contains("I&#39;d like a quote for &lt;your&gt; services &amp; support."));
    assert!(!email.html_body.contains("<your>"));
}

#[actix_rt::test]
async fn fourth_request_in_window_is_rate_limited() {
    let app = TestApp::spawn().await;

    for _ in 0..3 {
        let response = app.post_contact("203.0.113.7", &jane_doe()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.post_contact("203.0.113.7", &jane_doe()).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "900");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Too many requests. Please try again in 15 minutes.");
    assert_eq!(app.mailer.sent().len(), 3);

    let other = app.post_contact("198.51.100.4", &jane_doe()).await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn preflight_is_always_accepted() {
    let app = TestApp::spawn().await;
    for _ in 0..4 {
        app.post_contact("203.0.113.7", &jane_doe()).await;
    }

    let response = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/api/contact"))
        .header("X-Forwarded-For", "203.0.113.7")
        .header(header::ORIGIN, "https://elsewhere.example")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST, OPTIONS"
    );
    assert_eq!(response.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
}

#[actix_rt::test]
async fn missing_fields_are_rejected_without_delivery() {
    let app = TestApp::spawn().await;

    let response = app.post_contact("203.0.113.7", &json!({ "email": "jane@example.com" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Name is required");
    assert_eq!(body["details"][0]["field"], "name");
    assert_eq!(body["details"][1]["field"], "message");
    assert_eq!(body["details"][1]["message"], "Message is required");
    assert!(app.mailer.sent().is_empty());
}

#[actix_rt::test]
async fn malformed_email_is_rejected() {
    let app = TestApp::spawn().await;
    let mut submission = jane_doe();
    submission["email"] = json!("not-an-email");

    let response = app.post_contact("203.0.113.7", &submission).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Email format is not valid");
    assert!(app.mailer.sent().is_empty());
}

#[actix_rt::test]
async fn message_length_boundary() {
    let app = TestApp::spawn().await;
    let mut submission = jane_doe();

    submission["message"] = json!("123456789");
    let response = app.post_contact("203.0.113.7", &submission).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    submission["message"] = json!("1234567890");
    let response = app.post_contact("203.0.113.7", &submission).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn foreign_origin_is_forbidden() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/contact"))
        .header(header::ORIGIN, "https://evil.example")
        .json(&jane_doe())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.mailer.sent().is_empty());
}

#[actix_rt::test]
async fn matching_origin_is_accepted() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/contact"))
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .json(&jane_doe())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn non_post_methods_are_not_allowed() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/api/contact")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[actix_rt::test]
async fn form_encoded_body_is_accepted() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/contact"))
        .form(&[
            ("name", "Jane Doe"),
            ("email", "jane@example.com"),
            ("message", "Hello from a plain HTML form."),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.mailer.sent().len(), 1);
}

#[actix_rt::test]
async fn undecodable_body_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/api/contact"))
        .header(header::CONTENT_TYPE, "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid request body");
}

#[actix_rt::test]
async fn missing_smtp_settings_do_not_leak() {
    let mut env = smtp_env();
    env.remove("SMTP_PASS");
    let app = TestApp::spawn_with(test_config(), env, RecordingMailer::default()).await;

    let response = app.post_contact("203.0.113.7", &jane_doe()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(!body.contains("SMTP_PASS"));
    assert!(app.mailer.sent().is_empty());
}

#[actix_rt::test]
async fn unreachable_mail_server_is_service_unavailable() {
    let mailer = RecordingMailer::failing(DeliveryError::Connection("connection refused".into()));
    let app = TestApp::spawn_with(test_config(), smtp_env(), mailer).await;

    let response = app.post_contact("203.0.113.7", &jane_doe()).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.text().await.unwrap();
    assert!(!body.contains("refused"));
}

#[actix_rt::test]
async fn auto_reply_goes_to_submitter_when_enabled() {
    let config = AppConfig {
        auto_response_enabled: true,
        ..test_config()
    };
    let app = TestApp::spawn_with(config, smtp_env(), RecordingMailer::default()).await;

    let response = app.post_contact("203.0.113.7", &jane_doe()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.wait_for_emails(2).await;
    assert_eq!(sent.len(), 2);
    let reply = sent
        .iter()
        .find(|email| email.to == "jane@example.com")
        .expect("auto-reply not sent");
    assert_eq!(reply.subject, "Thanks for contacting Acme");
}

#[actix_rt::test]
async fn health_reports_service_status() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/api/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["service"], "contact-relay-api");
    assert!(body["uptime"].is_string());

    let response = app.client.post(app.url("/api/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_rt::test]
async fn uptime_counts_from_startup_not_first_health_check() {
    let app = TestApp::spawn().await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app.client.get(app.url("/api/health")).send().await.unwrap();

    let body: Value = response.json().await.unwrap();
    assert_ne!(body["uptime"], "0s");
}

#[actix_rt::test]
async fn analytics_requires_admin_key() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/api/analytics")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/api/analytics"))
        .header("X-Admin-Key", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.client.post(app.url("/api/analytics")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/api/analytics"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_rt::test]
async fn analytics_counts_submissions() {
    let app = TestApp::spawn().await;
    app.post_contact("127.0.0.1", &jane_doe()).await;
    app.post_contact("127.0.0.1", &json!({})).await;

    let response = app
        .client
        .get(app.url("/api/analytics"))
        .header("X-Admin-Key", ADMIN_KEY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_submissions"], 2);
    assert_eq!(body["success_rate"], 50.0);
    assert_eq!(body["top_countries"]["Local"], 2);
    assert_eq!(body["error_stats"]["HTTP 400"], 1);
}

#[actix_rt::test]
async fn analytics_is_disabled_without_a_key() {
    let config = AppConfig {
        admin_key: None,
        ..test_config()
    };
    let app = TestApp::spawn_with(config, smtp_env(), RecordingMailer::default()).await;

    let response = app
        .client
        .get(app.url("/api/analytics"))
        .header("X-Admin-Key", "")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
