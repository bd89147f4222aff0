use std::{collections::BTreeMap, net::IpAddr, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::entities::analytics::AnalyticsSnapshot;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successes: u64,
    countries: BTreeMap<String, u64>,
    hours: BTreeMap<String, u64>,
    errors: BTreeMap<String, u64>,
    last_updated: Option<DateTime<Utc>>,
}

/// In-memory submission counters. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct AnalyticsStore {
    counters: Arc<Mutex<Counters>>,
}

impl AnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u16, client_ip: &str, at: DateTime<Utc>) {
        let country = country_for_ip(client_ip);
        let hour = at.format("%H").to_string();

        let mut counters = self.counters.lock();
        counters.total += 1;
        if status == 200 {
            counters.successes += 1;
        } else {
            *counters.errors.entry(format!("HTTP {}", status)).or_default() += 1;
        }
        *counters.countries.entry(country.to_string()).or_default() += 1;
        *counters.hours.entry(hour).or_default() += 1;
        counters.last_updated = Some(at);
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        let counters = self.counters.lock();
        let success_rate = if counters.total == 0 {
            0.0
        } else {
            counters.successes as f64 / counters.total as f64 * 100.0
        };

        AnalyticsSnapshot {
            total_submissions: counters.total,
            success_rate,
            top_countries: counters.countries.clone(),
            hourly_stats: counters.hours.clone(),
            error_stats: counters.errors.clone(),
            last_updated: counters.last_updated,
        }
    }
}

/// Coarse origin bucket. There is no geo lookup, so only loopback is told apart.
fn country_for_ip(client_ip: &str) -> &'static str {
    match client_ip.parse::<IpAddr>() {
        Ok(ip) if ip.is_loopback() => "Local",
        _ => "Unknown",
    }
}
