//! Environment-driven configuration.
//!
//! Every setting has a default, so the binary starts with no environment at
//! all. Numeric values that fail to parse, overflow, or are zero fall back to
//! their default.

use std::env;
use std::time::Duration;

use anyhow::anyhow;

use crate::client::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};
use crate::client::{ClientOptions, DEFAULT_TIMEOUT, RetryPolicy};
use crate::dispatch::PermissionState;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default alert-subscription backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub notification_permission: PermissionState,
    /// Icon URL attached to every notification.
    pub notification_icon: Option<String>,
    /// If set, notifications are POSTed here instead of being logged.
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        // Zero is never a usable timeout, attempt count or delay.
        let positive = |key: &str, default: u64| {
            non_blank(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|&v| v > 0)
                .unwrap_or(default)
        };

        let notification_permission = match non_blank("AQI_ALERTS_NOTIFICATION_PERMISSION") {
            Some(value) => value
                .parse::<PermissionState>()
                .map_err(|e| anyhow!("AQI_ALERTS_NOTIFICATION_PERMISSION: {e}"))?,
            None => PermissionState::Granted,
        };

        let port = non_blank("AQI_ALERTS_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let api_url =
            non_blank("AQI_ALERTS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let max_attempts = u32::try_from(positive(
            "AQI_ALERTS_MAX_ATTEMPTS",
            u64::from(DEFAULT_MAX_ATTEMPTS),
        ))
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        Ok(Self {
            port,
            api_url,
            api_token: non_blank("AQI_ALERTS_API_TOKEN"),
            timeout: Duration::from_secs(positive(
                "AQI_ALERTS_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )),
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(positive(
                    "AQI_ALERTS_RETRY_BASE_MS",
                    DEFAULT_BASE_DELAY.as_millis() as u64,
                )),
                max_delay: Duration::from_millis(positive(
                    "AQI_ALERTS_RETRY_MAX_MS",
                    DEFAULT_MAX_DELAY.as_millis() as u64,
                )),
                ..RetryPolicy::default()
            },
            notification_permission,
            notification_icon: non_blank("AQI_ALERTS_NOTIFICATION_ICON"),
            webhook_url: non_blank("AQI_ALERTS_WEBHOOK_URL"),
        })
    }

    /// Client settings derived from this configuration.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.timeout,
            retry: self.retry,
            ..ClientOptions::new(&self.api_url)
        }
    }
}
