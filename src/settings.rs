use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{collections::HashMap, env, fmt, str::FromStr, time::Duration};
use url::Url;
use zeroize::Zeroizing;

use crate::{errors::ConfigurationError, limiter::rate_limiter::RateLimitPolicy};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Read the client address from proxy headers before the socket peer.
    #[serde(default = "default_true")]
    pub trust_proxy_headers: bool,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default)]
    pub allowed_origin: String,

    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    #[serde(default = "default_slack_channel")]
    pub slack_channel: String,

    #[serde(default)]
    pub auto_response_enabled: bool,

    #[serde(default)]
    pub admin_key: Option<String>,

    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Zero disables the temporary block after the limit is exceeded.
    #[serde(default = "default_rate_limit_block_secs")]
    pub rate_limit_block_secs: u64,

    #[serde(default = "default_rate_limit_retention_secs")]
    pub rate_limit_retention_secs: u64,

    #[serde(default = "default_rate_limit_sweep_secs")]
    pub rate_limit_sweep_secs: u64,

    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    #[serde(default = "default_notification_queue_size")]
    pub notification_queue_size: usize,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "contact-relay-api".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
fn default_true() -> bool {
    true
}
fn default_site_name() -> String {
    "Contact Relay".to_string()
}
fn default_allowed_origin() -> String {
    "*".to_string()
}
fn default_slack_channel() -> String {
    "#contact".to_string()
}
fn default_rate_limit_max_requests() -> u32 {
    3
}
fn default_rate_limit_window_secs() -> u64 {
    5 * 60
}
fn default_rate_limit_block_secs() -> u64 {
    15 * 60
}
fn default_rate_limit_retention_secs() -> u64 {
    10 * 60
}
fn default_rate_limit_sweep_secs() -> u64 {
    10 * 60
}
fn default_smtp_timeout_secs() -> u64 {
    10
}
fn default_webhook_timeout_secs() -> u64 {
    5
}
fn default_notification_queue_size() -> usize {
    100
}
fn default_max_body_bytes() -> usize {
    16 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            env: default_env(),
            name: default_name(),
            port: default_port(),
            host: default_host(),
            worker_count: default_worker_count(),
            log_format: default_log_format(),
            trust_proxy_headers: default_true(),
            site_name: default_site_name(),
            allowed_origin: default_allowed_origin(),
            slack_webhook_url: None,
            slack_channel: default_slack_channel(),
            auto_response_enabled: false,
            admin_key: None,
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_block_secs: default_rate_limit_block_secs(),
            rate_limit_retention_secs: default_rate_limit_retention_secs(),
            rate_limit_sweep_secs: default_rate_limit_sweep_secs(),
            smtp_timeout_secs: default_smtp_timeout_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            notification_queue_size: default_notification_queue_size(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;
        config.apply_unprefixed_env(|key| env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// The serverless deployment configured these without the `APP_` prefix.
    /// They only fill values the layered sources left empty.
    pub fn apply_unprefixed_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if self.allowed_origin.trim().is_empty() {
            self.allowed_origin = lookup("ALLOWED_ORIGIN").unwrap_or_else(default_allowed_origin);
        }
        if self.slack_webhook_url.is_none() {
            self.slack_webhook_url = lookup("SLACK_WEBHOOK_URL");
        }
        if let Some(channel) = lookup("SLACK_CHANNEL") {
            if self.slack_channel == default_slack_channel() {
                self.slack_channel = channel;
            }
        }
        if !self.auto_response_enabled {
            self.auto_response_enabled = lookup("AUTO_RESPONSE_ENABLED")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        }
        if self.admin_key.is_none() {
            self.admin_key = lookup("ADMIN_KEY");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.rate_limit_max_requests == 0 {
            errors.push("RATE_LIMIT_MAX_REQUESTS must be greater than zero".to_string());
        }
        if self.rate_limit_window_secs == 0 {
            errors.push("RATE_LIMIT_WINDOW_SECS must be greater than zero".to_string());
        }
        if self.rate_limit_retention_secs < self.rate_limit_window_secs {
            errors.push("RATE_LIMIT_RETENTION_SECS must not be shorter than RATE_LIMIT_WINDOW_SECS".to_string());
        }
        if self.rate_limit_sweep_secs == 0 {
            errors.push("RATE_LIMIT_SWEEP_SECS must be greater than zero".to_string());
        }
        if self.smtp_timeout_secs == 0 {
            errors.push("SMTP_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.notification_queue_size == 0 {
            errors.push("NOTIFICATION_QUEUE_SIZE must be greater than zero".to_string());
        }
        if let Some(webhook) = &self.slack_webhook_url {
            if let Err(e) = Url::parse(webhook) {
                errors.push(format!("SLACK_WEBHOOK_URL is not a valid URL: {}", e));
            }
        }
        if self.is_production() && self.allowed_origin.trim() == "*" {
            errors.push("Wildcard CORS (*) is not allowed in production".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
            block_duration: (self.rate_limit_block_secs > 0)
                .then(|| Duration::from_secs(self.rate_limit_block_secs)),
            retention: Duration::from_secs(self.rate_limit_retention_secs),
        }
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for Option<String> {
    fn redact(&self) -> &str {
        match self {
            Some(value) => value.as_str().redact(),
            None => "[NOT SET]",
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("log_format", &self.log_format)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("site_name", &self.site_name)
            .field("allowed_origin", &self.allowed_origin)
            .field("slack_webhook_url", &self.slack_webhook_url.redact())
            .field("slack_channel", &self.slack_channel)
            .field("auto_response_enabled", &self.auto_response_enabled)
            .field("admin_key", &self.admin_key.redact())
            .field("rate_limit_max_requests", &self.rate_limit_max_requests)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("rate_limit_block_secs", &self.rate_limit_block_secs)
            .field("rate_limit_retention_secs", &self.rate_limit_retention_secs)
            .field("rate_limit_sweep_secs", &self.rate_limit_sweep_secs)
            .field("smtp_timeout_secs", &self.smtp_timeout_secs)
            .field("webhook_timeout_secs", &self.webhook_timeout_secs)
            .field("notification_queue_size", &self.notification_queue_size)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Where request-time secrets come from. The process environment in production.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Implicit TLS from the first byte (SMTPS).
    Wrapper,
    /// Plain connection upgraded with a mandatory STARTTLS.
    StartTls,
    /// No encryption. Only for local relays.
    None,
}

impl SmtpTls {
    fn default_for_port(port: u16) -> Self {
        if port == 465 {
            SmtpTls::Wrapper
        } else {
            SmtpTls::StartTls
        }
    }
}

impl FromStr for SmtpTls {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wrapper" | "tls" | "smtps" => Ok(SmtpTls::Wrapper),
            "starttls" => Ok(SmtpTls::StartTls),
            "none" | "plain" => Ok(SmtpTls::None),
            other => Err(ConfigurationError::InvalidValue {
                key: "SMTP_TLS",
                reason: format!("unknown mode '{}'", other),
            }),
        }
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: Zeroizing<String>,
    pub from_address: String,
    pub to_email: String,
    pub tls: SmtpTls,
}

impl SmtpConfig {
    /// Reads the SMTP settings for one request. Every missing variable is reported at once.
    pub fn from_source(source: &dyn EnvSource) -> Result<Self, ConfigurationError> {
        let read = |key: &str| source.var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = read("SMTP_HOST");
        let port = read("SMTP_PORT");
        let user = read("SMTP_USER");
        let pass = source.var("SMTP_PASS").filter(|v| !v.is_empty());

        let (host, port, user, pass) = match (host, port, user, pass) {
            (Some(host), Some(port), Some(user), Some(pass)) => (host, port, user, pass),
            (host, port, user, pass) => {
                let missing = [
                    ("SMTP_HOST", host.is_none()),
                    ("SMTP_PORT", port.is_none()),
                    ("SMTP_USER", user.is_none()),
                    ("SMTP_PASS", pass.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, absent)| absent.then_some(key))
                .collect();
                return Err(ConfigurationError::MissingVariables(missing));
            }
        };

        let port: u16 = port.parse().map_err(|_| ConfigurationError::InvalidValue {
            key: "SMTP_PORT",
            reason: format!("'{}' is not a port number", port),
        })?;

        let tls = match read("SMTP_TLS") {
            Some(mode) => mode.parse()?,
            None => SmtpTls::default_for_port(port),
        };

        let to_email = read("TO_EMAIL").unwrap_or_else(|| {
            tracing::warn!("TO_EMAIL not set, delivering to the SMTP user mailbox");
            user.clone()
        });
        let from_address = read("SMTP_FROM").unwrap_or_else(|| user.clone());

        Ok(SmtpConfig {
            host,
            port,
            user,
            pass: Zeroizing::new(pass),
            from_address,
            to_email,
            tls,
        })
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &self.pass.as_str().redact())
            .field("from_address", &self.from_address)
            .field("to_email", &self.to_email)
            .field("tls", &self.tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn complete_env() -> HashMap<String, String> {
        smtp_env(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER", "relay@example.com"),
            ("SMTP_PASS", "hunter2"),
            ("TO_EMAIL", "inbox@example.com"),
        ])
    }

    #[test]
    fn smtp_config_loads_complete_environment() {
        let config = SmtpConfig::from_source(&complete_env()).unwrap();

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.to_email, "inbox@example.com");
        assert_eq!(config.from_address, "relay@example.com");
        assert_eq!(config.tls, SmtpTls::StartTls);
    }

    #[test]
    fn smtp_config_reports_every_missing_variable() {
        let env = smtp_env(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_PORT", "  ")]);

        let err = SmtpConfig::from_source(&env).unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::MissingVariables(vec!["SMTP_PORT", "SMTP_USER", "SMTP_PASS"])
        );
    }

    #[test]
    fn smtp_config_rejects_non_numeric_port() {
        let mut env = complete_env();
        env.insert("SMTP_PORT".into(), "smtp".into());

        let err = SmtpConfig::from_source(&env).unwrap_err();

        assert!(matches!(err, ConfigurationError::InvalidValue { key: "SMTP_PORT", .. }));
    }

    #[test]
    fn smtp_config_falls_back_to_user_mailbox() {
        let mut env = complete_env();
        env.remove("TO_EMAIL");

        let config = SmtpConfig::from_source(&env).unwrap();

        assert_eq!(config.to_email, "relay@example.com");
    }

    #[test]
    fn smtp_tls_mode_follows_port_unless_overridden() {
        let mut env = complete_env();
        env.insert("SMTP_PORT".into(), "465".into());
        assert_eq!(SmtpConfig::from_source(&env).unwrap().tls, SmtpTls::Wrapper);

        env.insert("SMTP_TLS".into(), "none".into());
        assert_eq!(SmtpConfig::from_source(&env).unwrap().tls, SmtpTls::None);

        env.insert("SMTP_TLS".into(), "bogus".into());
        assert!(SmtpConfig::from_source(&env).is_err());
    }

    #[test]
    fn smtp_debug_output_redacts_password() {
        let config = SmtpConfig::from_source(&complete_env()).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn unprefixed_env_fills_empty_values_only() {
        let mut config = AppConfig {
            allowed_origin: String::new(),
            ..AppConfig::default()
        };
        let env = smtp_env(&[
            ("ALLOWED_ORIGIN", "https://example.com"),
            ("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T/B/X"),
            ("AUTO_RESPONSE_ENABLED", "TRUE"),
            ("ADMIN_KEY", "s3cret"),
        ]);

        config.apply_unprefixed_env(|key| env.get(key).cloned());

        assert_eq!(config.allowed_origin, "https://example.com");
        assert!(config.slack_webhook_url.is_some());
        assert!(config.auto_response_enabled);
        assert_eq!(config.admin_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let config = AppConfig {
            env: AppEnvironment::Production,
            allowed_origin: "*".into(),
            slack_webhook_url: Some("not a url".into()),
            rate_limit_max_requests: 0,
            ..AppConfig::default()
        };

        let err = config.validate().unwrap_err().to_string();

        assert!(err.contains("Wildcard CORS"));
        assert!(err.contains("SLACK_WEBHOOK_URL"));
        assert!(err.contains("RATE_LIMIT_MAX_REQUESTS"));
    }

    #[test]
    fn validate_rejects_retention_shorter_than_window() {
        let config = AppConfig {
            rate_limit_window_secs: 300,
            rate_limit_retention_secs: 60,
            ..AppConfig::default()
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("RATE_LIMIT_RETENTION_SECS"));

        let config = AppConfig {
            rate_limit_window_secs: 300,
            rate_limit_retention_secs: 300,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_block_seconds_disables_blocking() {
        let config = AppConfig {
            rate_limit_block_secs: 0,
            ..AppConfig::default()
        };

        assert!(config.rate_limit_policy().block_duration.is_none());
        assert_eq!(AppConfig::default().rate_limit_policy().block_duration, Some(Duration::from_secs(900)));
    }

    #[test]
    fn debug_output_redacts_admin_key() {
        let config = AppConfig {
            admin_key: Some("s3cret".into()),
            ..AppConfig::default()
        };

        assert!(!format!("{:?}", config).contains("s3cret"));
    }
}
