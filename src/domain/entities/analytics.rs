use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated contact form outcomes since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub total_submissions: u64,
    /// Percentage of submissions answered with 200, from 0 to 100.
    pub success_rate: f64,
    pub top_countries: BTreeMap<String, u64>,
    /// Keyed by UTC hour, "00" through "23".
    pub hourly_stats: BTreeMap<String, u64>,
    pub error_stats: BTreeMap<String, u64>,
    pub last_updated: Option<DateTime<Utc>>,
}
