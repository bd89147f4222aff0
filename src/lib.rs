use std::sync::Arc;

use anyhow::Context;
use url::Url;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, routes};
pub use infrastructure::{analytics, limiter, mail, notifications, utils};

use analytics::store::AnalyticsStore;
use limiter::rate_limiter::RateLimiter;
use mail::{smtp::MailSender, templates::EmailRenderer};
use notifications::{
    auto_reply::AutoResponder,
    slack::SlackNotifier,
    worker::{notification_channel, Fanout, NotificationWorker},
};
use settings::{AppConfig, EnvSource};
use use_cases::contact::ContactHandler;

pub struct AppState {
    pub config: AppConfig,
    pub contact_handler: ContactHandler,
    pub rate_limiter: RateLimiter,
    pub analytics: AnalyticsStore,
}

impl AppState {
    /// Wires the request pipeline. The returned worker must be spawned for
    /// Slack and auto-reply notifications to go out.
    pub fn build(
        config: AppConfig,
        mailer: Arc<dyn MailSender>,
        env: Arc<dyn EnvSource>,
    ) -> anyhow::Result<(Self, NotificationWorker)> {
        constants::mark_process_start();

        let renderer = Arc::new(
            EmailRenderer::new(config.site_name.clone()).context("Failed to load email templates")?,
        );

        let slack = match &config.slack_webhook_url {
            Some(url) => {
                let url = Url::parse(url).context("Invalid SLACK_WEBHOOK_URL")?;
                let notifier = SlackNotifier::new(
                    url,
                    config.slack_channel.clone(),
                    &config.site_name,
                    config.webhook_timeout(),
                )
                .context("Failed to build Slack client")?;
                Some(notifier)
            }
            None => None,
        };

        let auto_responder = config
            .auto_response_enabled
            .then(|| AutoResponder::new(Arc::clone(&mailer), Arc::clone(&renderer)));

        tracing::info!(
            slack = slack.is_some(),
            auto_response = auto_responder.is_some(),
            "Notification fan-out configured"
        );

        let (queue, worker) = notification_channel(
            config.notification_queue_size,
            Fanout { slack, auto_responder },
        );

        let contact_handler = ContactHandler::new(mailer, renderer, env, queue);
        let rate_limiter = RateLimiter::new(config.rate_limit_policy());

        Ok((
            AppState {
                config,
                contact_handler,
                rate_limiter,
                analytics: AnalyticsStore::new(),
            },
            worker,
        ))
    }
}
