use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    entities::contact::ContactSubmission,
    notifications::{auto_reply::AutoResponder, slack::SlackNotifier},
    settings::SmtpConfig,
};

/// Everything the fan-out needs about one delivered submission.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub submission: ContactSubmission,
    pub client_ip: String,
    pub smtp: SmtpConfig,
    pub received_at: DateTime<Utc>,
}

/// The optional side effects run after the primary email is delivered.
#[derive(Clone, Default)]
pub struct Fanout {
    pub slack: Option<SlackNotifier>,
    pub auto_responder: Option<AutoResponder>,
}

impl Fanout {
    pub fn is_empty(&self) -> bool {
        self.slack.is_none() && self.auto_responder.is_none()
    }

    /// Runs every configured notification concurrently. Failures are logged and dropped.
    pub async fn deliver(&self, job: NotificationJob) {
        let slack = async {
            if let Some(slack) = &self.slack {
                if let Err(e) = slack.notify(&job).await {
                    tracing::error!(target: "notifications", client_ip = %job.client_ip, "Slack notification failed: {}", e);
                }
            }
        };
        let auto_reply = async {
            if let Some(responder) = &self.auto_responder {
                if let Err(e) = responder.respond(&job).await {
                    tracing::error!(target: "notifications", client_ip = %job.client_ip, "Auto-response failed: {}", e);
                }
            }
        };

        tokio::join!(slack, auto_reply);
    }
}

/// Producer side, held by request handlers. Never blocks.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: Option<mpsc::Sender<NotificationJob>>,
}

impl NotificationQueue {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Hands a job to the worker. Returns `false` when the job was dropped.
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(target: "notifications", client_ip = %job.client_ip, "Notification queue full, dropping job");
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(target: "notifications", client_ip = %job.client_ip, "Notification worker stopped, dropping job");
                false
            }
        }
    }
}

/// Consumer side. Spawns one detached task per job so a slow webhook never
/// holds up the jobs behind it.
pub struct NotificationWorker {
    rx: mpsc::Receiver<NotificationJob>,
    fanout: Arc<Fanout>,
}

impl NotificationWorker {
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            let fanout = Arc::clone(&self.fanout);
            tokio::spawn(async move { fanout.deliver(job).await });
        }
        tracing::debug!(target: "notifications", "Notification queue closed, worker exiting");
    }
}

/// Builds the queue/worker pair. With nothing configured the queue starts
/// disabled and the worker exits as soon as it runs.
pub fn notification_channel(capacity: usize, fanout: Fanout) -> (NotificationQueue, NotificationWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let queue = if fanout.is_empty() {
        NotificationQueue::disabled()
    } else {
        NotificationQueue { tx: Some(tx) }
    };

    (queue, NotificationWorker { rx, fanout: Arc::new(fanout) })
}
