use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokenq_fairness::{
    DEFAULT_AUTO_ASSIGN_INTERVAL_SECS, DEFAULT_FAIRNESS_THRESHOLD, DEFAULT_MAX_SERVING_TIME_SECS,
    DEFAULT_PER_TOKEN_MINUTES,
};

use crate::store::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub queue: QueueConfig,
    pub database: DbConfig,
    pub sms: SmsConfig,
}

/// Scheduling policy knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Max tokens a counter may skip ahead of the earliest waiting token.
    pub fairness_threshold: u32,

    /// Interval between automatic assignment cycles.
    pub auto_assign_interval: Duration,

    /// Maximum serving time before forced completion, in seconds.
    pub max_serving_time_secs: u64,

    /// Minutes per token, used only for estimated-wait display.
    pub per_token_minutes: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            fairness_threshold: DEFAULT_FAIRNESS_THRESHOLD,
            auto_assign_interval: Duration::from_secs(DEFAULT_AUTO_ASSIGN_INTERVAL_SECS),
            max_serving_time_secs: DEFAULT_MAX_SERVING_TIME_SECS,
            per_token_minutes: DEFAULT_PER_TOKEN_MINUTES,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let fairness_threshold = std::env::var("FAIRNESS_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FAIRNESS_THRESHOLD);

        let auto_assign_interval_secs = std::env::var("AUTO_ASSIGN_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AUTO_ASSIGN_INTERVAL_SECS);

        let max_serving_time_secs = std::env::var("MAX_SERVING_TIME")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SERVING_TIME_SECS);

        let per_token_minutes = std::env::var("PER_TOKEN_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PER_TOKEN_MINUTES);

        Self {
            fairness_threshold,
            auto_assign_interval: Duration::from_secs(auto_assign_interval_secs),
            max_serving_time_secs,
            per_token_minutes,
        }
    }
}

/// SMS provider settings (Twilio).
#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub account_sid: String,
    pub auth_token: String,
    pub messaging_service_sid: Option<String>,
    pub from_number: Option<String>,
}

impl SmsConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("SMS_ENABLED")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").unwrap_or_default();
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default();
        let messaging_service_sid = std::env::var("TWILIO_MESSAGING_SERVICE_SID")
            .ok()
            .filter(|s| !s.is_empty());
        let from_number = std::env::var("TWILIO_PHONE_NUMBER")
            .ok()
            .filter(|s| !s.is_empty());

        Self {
            enabled,
            account_sid,
            auth_token,
            messaging_service_sid,
            from_number,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("TOKENQ_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = std::env::var("TOKENQ_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("TOKENQ_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            queue: QueueConfig::from_env(),
            database: DbConfig::from_env(),
            sms: SmsConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.fairness_threshold, 3);
        assert_eq!(config.auto_assign_interval.as_secs(), 5);
        assert_eq!(config.max_serving_time_secs, 600);
        assert_eq!(config.per_token_minutes, 2);
    }
}
