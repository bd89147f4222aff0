use tokio::task::JoinHandle;

use crate::{notifications::worker::NotificationWorker, AppState};

/// Long-running tasks owned by the process: the rate limiter sweep and the
/// notification worker.
pub struct BackgroundTasks {
    sweeper: JoinHandle<()>,
    notifications: JoinHandle<()>,
}

impl BackgroundTasks {
    pub fn spawn(state: &AppState, worker: NotificationWorker) -> Self {
        let every = state.config.rate_limit_sweep_interval();
        let policy = state.rate_limiter.policy();
        tracing::info!(
            max_requests = policy.max_requests,
            window = %humantime::format_duration(policy.window),
            block = %policy.block_duration.map(|b| humantime::format_duration(b).to_string()).unwrap_or_else(|| "off".into()),
            interval = %humantime::format_duration(every),
            "Starting rate limit sweep"
        );

        Self {
            sweeper: state.rate_limiter.spawn_sweeper(every),
            notifications: tokio::spawn(worker.run()),
        }
    }

    /// Stops both tasks. Notifications still in the queue are dropped.
    pub fn shutdown(self) {
        self.sweeper.abort();
        self.notifications.abort();
        tracing::info!("Background tasks stopped");
    }
}
