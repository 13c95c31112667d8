//! Data models for AQI alerts.
//!
//! Two families of types live here:
//!
//! - Domain types ([`Alert`], [`Threshold`], [`Condition`], [`Channel`], [`AqiUpdate`])
//!   used by the crossing detector and the notification dispatcher.
//! - Wire types ([`AlertSubscription`], [`CreateAlertRequest`], [`AlertUpdate`]) that
//!   mirror the alert-subscription backend's JSON contract.
//!
//! Wire types are converted into domain types once, when the alert store is
//! refreshed, so the evaluation path never sees an out-of-range threshold.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::error::ApiError;

/// Highest value on the AQI scale.
pub const AQI_MAX: u16 = 500;

/// An alert threshold on the AQI scale, always within `[0, 500]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Threshold(u16);

impl Threshold {
    /// Create a threshold, rejecting values outside the AQI scale.
    pub fn new(value: i64) -> Result<Self, ApiError> {
        if (0..=i64::from(AQI_MAX)).contains(&value) {
            Ok(Threshold(value as u16))
        } else {
            Err(ApiError::validation(format!(
                "Threshold must be between 0 and {AQI_MAX}, got {value}"
            )))
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of the threshold an alert cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Notify when the AQI rises across the threshold.
    #[default]
    Above,
    /// Notify when the AQI falls across the threshold.
    Below,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Above => "above",
            Condition::Below => "below",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification delivery medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

/// A named place an alert is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    /// A location known only by name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            latitude: None,
            longitude: None,
            country: None,
        }
    }

    /// Whether an incoming AQI update for `name` targets this location.
    ///
    /// Matching ignores surrounding whitespace and ASCII case.
    pub fn matches(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// A user-owned alert rule, as cached by the alert store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Backend-assigned identifier.
    pub id: String,
    pub location: Location,
    pub threshold: Threshold,
    pub condition: Condition,
    /// Disabled alerts are kept in the cache but never evaluated.
    pub enabled: bool,
    pub notification_channels: Vec<Channel>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.notification_channels.contains(&channel)
    }
}

impl TryFrom<AlertSubscription> for Alert {
    type Error = ApiError;

    fn try_from(sub: AlertSubscription) -> Result<Self, Self::Error> {
        let threshold = Threshold::new(sub.threshold)?;
        let location = match sub.location {
            LocationField::Name(name) => Location::named(&name),
            LocationField::Place(place) => place,
        };
        if location.name.trim().is_empty() {
            return Err(ApiError::validation("Location is required"));
        }

        Ok(Alert {
            id: sub.id,
            location,
            threshold,
            condition: sub.condition,
            enabled: sub.is_active,
            notification_channels: sub.channels,
            created_at: sub.created_at,
        })
    }
}

/// AQI health category (US EPA bands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Determine the category for an AQI value.
    ///
    /// # Bands
    ///
    /// - `good`: 0-50
    /// - `moderate`: 51-100
    /// - `unhealthy_for_sensitive_groups`: 101-150
    /// - `unhealthy`: 151-200
    /// - `very_unhealthy`: 201-300
    /// - `hazardous`: 301 and above
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

/// A single reading pushed by the AQI update feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AqiUpdate {
    /// Location name the reading belongs to.
    pub location: String,

    /// Current AQI value.
    pub aqi: u16,

    /// Category label supplied by the feed, if any.
    #[serde(default)]
    pub category: Option<String>,
}

impl AqiUpdate {
    pub fn new(location: &str, aqi: u16) -> Self {
        Self {
            location: location.to_string(),
            aqi,
            category: None,
        }
    }

    /// The feed's category label, or one derived from the AQI value.
    pub fn category_label(&self) -> String {
        match &self.category {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => AqiCategory::from_aqi(self.aqi).label().to_string(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// `location` as returned by the backend: either a bare name or a full place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationField {
    Name(String),
    Place(Location),
}

/// Alert ids arrive as strings or as numbers depending on the backend.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdField {
    Text(String),
    Number(serde_json::Number),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match IdField::deserialize(deserializer)? {
        IdField::Text(id) => id,
        IdField::Number(id) => id.to_string(),
    })
}

/// An alert subscription as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSubscription {
    /// Opaque identifier, normalised to a string.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub location: LocationField,

    /// Kept wide so an out-of-range value can be reported instead of failing decode.
    pub threshold: i64,

    #[serde(default)]
    pub condition: Condition,

    #[serde(default)]
    pub channels: Vec<Channel>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// Request body for creating an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    pub location: String,
    pub threshold: i64,
    pub condition: Condition,
    #[serde(rename = "notificationChannels")]
    pub notification_channels: Vec<Channel>,
}

impl CreateAlertRequest {
    /// Check the request locally so malformed input never reaches the network.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.location.trim().is_empty() {
            return Err(ApiError::validation("Location is required"));
        }
        Threshold::new(self.threshold)?;
        validate_channels(&self.notification_channels)
    }
}

/// Partial update of an alert; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(
        default,
        rename = "notificationChannels",
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_channels: Option<Vec<Channel>>,

    #[serde(default, rename = "is_active", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl AlertUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(threshold) = self.threshold {
            Threshold::new(threshold)?;
        }
        if let Some(channels) = &self.notification_channels {
            validate_channels(channels)?;
        }
        Ok(())
    }
}

fn validate_channels(channels: &[Channel]) -> Result<(), ApiError> {
    if channels.is_empty() {
        Err(ApiError::validation(
            "At least one notification channel is required",
        ))
    } else {
        Ok(())
    }
}
