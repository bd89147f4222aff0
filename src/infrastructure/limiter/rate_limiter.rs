use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub max_requests: u32,
    pub window: Duration,
    /// When set, exceeding the limit locks the client out for this long,
    /// even across window resets.
    pub block_duration: Option<Duration>,
    /// Idle entries older than this are dropped by the sweep.
    pub retention: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(5 * 60),
            block_duration: Some(Duration::from_secs(15 * 60)),
            retention: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone)]
struct ClientRateState {
    request_count: u32,
    window_start: Instant,
    last_seen: Instant,
    blocked_until: Option<Instant>,
}

impl ClientRateState {
    fn new(now: Instant) -> Self {
        Self {
            request_count: 1,
            window_start: now,
            last_seen: now,
            blocked_until: None,
        }
    }

    fn restart_window(&mut self, now: Instant) {
        self.request_count = 1;
        self.window_start = now;
        self.blocked_until = None;
    }

    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
    /// The client is serving a temporary block rather than waiting out the window.
    pub blocked: bool,
}

impl RateLimitExceeded {
    /// Whole seconds for a `Retry-After` header, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
        secs.max(1)
    }
}

type ClientMap = HashMap<String, ClientRateState>;

/// Fixed-window request counter keyed by client IP.
///
/// Every read and write goes through one lock, the sweep included. Critical
/// sections are O(1) except for the sweep, which never runs I/O under the lock.
#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<Mutex<ClientMap>>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn allow(&self, client_ip: &str) -> Result<(), RateLimitExceeded> {
        self.allow_at(client_ip, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, client_ip: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut clients = self.clients.lock();

        let Some(state) = clients.get_mut(client_ip) else {
            clients.insert(client_ip.to_string(), ClientRateState::new(now));
            return Ok(());
        };

        state.last_seen = now;

        if let Some(until) = state.blocked_until {
            if now < until {
                return Err(RateLimitExceeded {
                    retry_after: until - now,
                    blocked: true,
                });
            }
            state.restart_window(now);
            return Ok(());
        }

        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed > self.policy.window {
            state.restart_window(now);
            return Ok(());
        }

        state.request_count = state.request_count.saturating_add(1);
        if state.request_count <= self.policy.max_requests {
            return Ok(());
        }

        match self.policy.block_duration {
            Some(block) => {
                state.blocked_until = Some(now + block);
                Err(RateLimitExceeded {
                    retry_after: block,
                    blocked: true,
                })
            }
            None => Err(RateLimitExceeded {
                retry_after: self.policy.window.saturating_sub(elapsed),
                blocked: false,
            }),
        }
    }

    /// Drops idle clients past the retention horizon. Blocked clients are kept
    /// until their block expires.
    pub fn purge_stale_at(&self, now: Instant) -> usize {
        purge_stale(&self.clients, self.policy.retention, now)
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    /// Starts the periodic sweep. The task ends on its own once every clone
    /// of this limiter has been dropped; abort the handle to stop it sooner.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let clients = Arc::downgrade(&self.clients);
        let retention = self.policy.retention;
        tokio::spawn(sweep_stale_clients(clients, retention, every))
    }
}

fn purge_stale(clients: &Mutex<ClientMap>, retention: Duration, now: Instant) -> usize {
    let mut clients = clients.lock();
    let before = clients.len();
    clients.retain(|_, state| {
        state.is_blocked(now) || now.saturating_duration_since(state.last_seen) <= retention
    });
    before - clients.len()
}

async fn sweep_stale_clients(clients: Weak<Mutex<ClientMap>>, retention: Duration, every: Duration) {
    let mut ticker = interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(clients) = clients.upgrade() else {
            tracing::debug!("Rate limiter dropped, stopping sweep");
            break;
        };

        let purged = purge_stale(&clients, retention, Instant::now());
        if purged > 0 {
            tracing::debug!(purged, "Purged idle rate limit entries");
        }
    }
}
