//! Edge-triggered threshold crossing detection.
//!
//! Each alert gets its own [`CrossingState`], keyed by alert id. A crossing
//! fires only when the value moves across the threshold between two
//! consecutive observations, never merely because it sits on one side:
//!
//! - `above`: fires iff `previous <= threshold && current > threshold`
//! - `below`: fires iff `previous >= threshold && current < threshold`
//!
//! The first observation for an alert never fires. Staying on the same side
//! never fires again until the value returns and re-crosses.
//!
//! State is explicitly evicted when an alert is disabled, deleted, or moved
//! to another location, so re-enabling starts from [`Side::Unknown`].
//!
//! Nothing here performs I/O.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Alert, Condition, Threshold};

/// Where the last observed value sits relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// No reading observed yet.
    Unknown,
    Below,
    Above,
}

impl Side {
    /// `Above` iff `value >= threshold`.
    pub fn classify(value: u16, threshold: Threshold) -> Self {
        if value >= threshold.value() {
            Side::Above
        } else {
            Side::Below
        }
    }
}

/// Per-alert crossing state.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossingState {
    pub side: Side,
    last_value: Option<u16>,
    location: String,
}

impl CrossingState {
    fn fresh(location: &str) -> Self {
        Self {
            side: Side::Unknown,
            last_value: None,
            location: location.to_string(),
        }
    }
}

/// A notification-worthy threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossing {
    pub alert_id: String,
    /// The alert's condition, which is also the direction of the crossing.
    pub condition: Condition,
    pub threshold: Threshold,
    pub previous: u16,
    pub current: u16,
}

/// Owns the crossing state of every evaluated alert.
#[derive(Debug, Default)]
pub struct CrossingDetector {
    states: HashMap<String, CrossingState>,
}

impl CrossingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation for `alert` and report whether it crossed.
    ///
    /// A disabled alert has its state discarded and never fires.
    pub fn observe(&mut self, alert: &Alert, value: u16) -> Option<Crossing> {
        if !alert.enabled {
            self.forget(&alert.id);
            return None;
        }

        let state = self
            .states
            .entry(alert.id.clone())
            .or_insert_with(|| CrossingState::fresh(&alert.location.name));

        // Same id, different place: the old readings say nothing about this one.
        if !alert.location.matches(&state.location) {
            *state = CrossingState::fresh(&alert.location.name);
        }

        let previous = state.last_value.replace(value);
        state.side = Side::classify(value, alert.threshold);

        let previous = previous?;
        let threshold = alert.threshold.value();
        let crossed = match alert.condition {
            Condition::Above => previous <= threshold && value > threshold,
            Condition::Below => previous >= threshold && value < threshold,
        };

        crossed.then(|| Crossing {
            alert_id: alert.id.clone(),
            condition: alert.condition,
            threshold: alert.threshold,
            previous,
            current: value,
        })
    }

    /// Current side for an alert; `Unknown` if it has no state.
    pub fn side(&self, alert_id: &str) -> Side {
        self.states
            .get(alert_id)
            .map_or(Side::Unknown, |state| state.side)
    }

    /// Discard the state of one alert.
    pub fn forget(&mut self, alert_id: &str) {
        self.states.remove(alert_id);
    }

    /// Drop state for alerts that are gone, disabled, or moved elsewhere.
    pub fn retain_active(&mut self, alerts: &[Alert]) {
        self.states.retain(|id, state| {
            alerts.iter().any(|alert| {
                &alert.id == id && alert.enabled && alert.location.matches(&state.location)
            })
        });
    }

    /// Number of alerts with tracked state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
