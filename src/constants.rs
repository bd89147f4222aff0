use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pins `START_TIME` to now unless something already read it.
pub fn mark_process_start() -> DateTime<Utc> {
    *Lazy::force(&START_TIME)
}
