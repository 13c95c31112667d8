//! Notification dispatch for fired crossings.
//!
//! The [`Dispatcher`] turns a [`Crossing`] into a [`NotificationPayload`] and
//! hands it to a [`NotificationSink`], the external delivery capability.
//!
//! # Preconditions
//!
//! Nothing is built or delivered unless all of these hold:
//!
//! - the alert is enabled
//! - the alert's channels include `push` (other channels are delivered server-side)
//! - notification permission is [`PermissionState::Granted`]
//!
//! A failed precondition is silent: no delivery and no log output.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crossing::Crossing;
use crate::model::{Alert, Channel, Condition};

/// Host notification permission, as a browser reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Default,
}

impl FromStr for PermissionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(PermissionState::Granted),
            "denied" => Ok(PermissionState::Denied),
            "default" => Ok(PermissionState::Default),
            other => Err(format!("unknown notification permission '{other}'")),
        }
    }
}

/// Structured part of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub alert_id: String,
    pub location: String,
    pub aqi: u16,
    pub threshold: u16,
    pub condition: Condition,
    pub category: String,
    /// When the notification was dispatched, not when the reading was taken.
    pub timestamp: DateTime<Utc>,
}

/// Options passed alongside the title to the delivery capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub data: NotificationData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Lets the device collapse repeated notifications for the same alert.
    pub tag: String,
}

/// A fully formed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub options: NotificationOptions,
}

impl NotificationPayload {
    /// Build the payload for a crossing.
    ///
    /// `now` is the dispatch time recorded in `data.timestamp`.
    pub fn build(
        alert: &Alert,
        crossing: &Crossing,
        category: &str,
        icon: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let location = alert.location.name.as_str();
        let aqi = crossing.current;
        let threshold = crossing.threshold;

        let (title, body) = match crossing.condition {
            Condition::Above => (
                format!("Air Quality Alert: {location}"),
                format!(
                    "AQI in {location} has risen to {aqi} ({category}), exceeding your \
                     threshold of {threshold}. Limit outdoor activity and consider \
                     wearing a mask."
                ),
            ),
            Condition::Below => (
                format!("Air Quality Improved: {location}"),
                format!(
                    "AQI in {location} has improved to {aqi} ({category}), dropping below \
                     your threshold of {threshold}. It's a good time to open the windows \
                     or head outside."
                ),
            ),
        };

        Self {
            title,
            options: NotificationOptions {
                body,
                data: NotificationData {
                    alert_id: alert.id.clone(),
                    location: location.to_string(),
                    aqi,
                    threshold: threshold.value(),
                    condition: crossing.condition,
                    category: category.to_string(),
                    timestamp: now,
                },
                icon: icon.map(str::to_string),
                tag: format!("aqi-alert-{}", alert.id),
            },
        }
    }
}

/// The external "deliver to the user's device" capability.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. Called at most once per fired crossing.
    fn deliver(&self, payload: &NotificationPayload);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, payload: &NotificationPayload) {
        info!(
            title = %payload.title,
            body = %payload.options.body,
            tag = %payload.options.tag,
            "Notification delivered"
        );
    }
}

/// Sink that POSTs each notification as JSON to a webhook.
///
/// Delivery runs on a spawned task so the evaluation path never blocks.
#[derive(Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

impl NotificationSink for WebhookSink {
    fn deliver(&self, payload: &NotificationPayload) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(url = %self.url, "No async runtime, webhook notification dropped");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let payload = payload.clone();

        runtime.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(tag = %payload.options.tag, "Webhook notification delivered");
                }
                Ok(response) => {
                    warn!(
                        tag = %payload.options.tag,
                        status = response.status().as_u16(),
                        "Webhook rejected notification"
                    );
                }
                Err(e) => {
                    warn!(tag = %payload.options.tag, error = %e, "Webhook delivery failed");
                }
            }
        });
    }
}

/// Decides whether a crossing is delivered and delivers it.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    permission: PermissionState,
    icon: Option<String>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, permission: PermissionState) -> Self {
        Self {
            sink,
            permission,
            icon: None,
        }
    }

    /// Set the icon URL attached to every notification.
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn set_permission(&mut self, permission: PermissionState) {
        self.permission = permission;
    }

    /// Deliver a notification for `crossing` if every precondition holds.
    ///
    /// # Returns
    ///
    /// The delivered payload, or `None` if a precondition failed.
    pub fn dispatch(
        &self,
        alert: &Alert,
        crossing: &Crossing,
        category: &str,
    ) -> Option<NotificationPayload> {
        if !self.should_deliver(alert) {
            return None;
        }

        let payload = NotificationPayload::build(
            alert,
            crossing,
            category,
            self.icon.as_deref(),
            Utc::now(),
        );
        self.sink.deliver(&payload);

        info!(
            alert_id = %alert.id,
            location = %payload.options.data.location,
            aqi = payload.options.data.aqi,
            threshold = payload.options.data.threshold,
            condition = %payload.options.data.condition,
            "Crossing notification dispatched"
        );

        Some(payload)
    }

    fn should_deliver(&self, alert: &Alert) -> bool {
        alert.enabled
            && alert.has_channel(Channel::Push)
            && self.permission == PermissionState::Granted
    }
}
