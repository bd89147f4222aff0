pub mod analytics;
pub mod limiter;
pub mod mail;
pub mod notifications;
pub mod utils;
