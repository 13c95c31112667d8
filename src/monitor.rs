//! Evaluation of AQI updates against cached alerts.
//!
//! For each update, every enabled alert bound to the update's location is
//! run through the [`CrossingDetector`] in cache order, and each crossing is
//! handed to the [`Dispatcher`]. The whole pass is synchronous.
//!
//! Updates must arrive in order per location; the monitor does not reorder.

use tracing::debug;

use crate::crossing::{CrossingDetector, Side};
use crate::dispatch::{Dispatcher, NotificationPayload};
use crate::model::AqiUpdate;
use crate::store::AlertStore;

/// Ties the alert store, crossing detector, and dispatcher together.
pub struct AlertMonitor {
    store: AlertStore,
    detector: CrossingDetector,
    dispatcher: Dispatcher,
}

impl AlertMonitor {
    pub fn new(store: AlertStore, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            detector: CrossingDetector::new(),
            dispatcher,
        }
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Crossing side currently tracked for an alert.
    pub fn side(&self, alert_id: &str) -> Side {
        self.detector.side(alert_id)
    }

    /// Evaluate one AQI reading.
    ///
    /// Crossing state of alerts that were deleted or disabled since the last
    /// update is discarded first.
    ///
    /// # Returns
    ///
    /// The notifications delivered for this reading, in cache order.
    pub fn handle_update(&mut self, update: &AqiUpdate) -> Vec<NotificationPayload> {
        self.detector.retain_active(&self.store.snapshot());

        let alerts = self.store.alerts_for(&update.location);
        let category = update.category_label();
        let mut delivered = Vec::new();

        for alert in &alerts {
            if let Some(crossing) = self.detector.observe(alert, update.aqi) {
                debug!(
                    alert_id = %alert.id,
                    previous = crossing.previous,
                    current = crossing.current,
                    "Threshold crossed"
                );
                delivered.extend(self.dispatcher.dispatch(alert, &crossing, &category));
            }
        }

        debug!(
            location = %update.location,
            aqi = update.aqi,
            evaluated = alerts.len(),
            dispatched = delivered.len(),
            "AQI update evaluated"
        );

        delivered
    }
}
