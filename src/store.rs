//! In-memory cache of the user's alert rules.
//!
//! The store serves the crossing detector without hitting the backend on
//! every AQI update. The cached set is replaced as a whole on each successful
//! refresh; readers get an `Arc` snapshot and never see a half-updated set.
//!
//! A failed refresh keeps the previous set: stale-but-available is preferred
//! over empty-but-fresh.
//!
//! Refreshes run one at a time, so a slow fetch started before a mutation can
//! never overwrite the set fetched after it.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::client::{AlertApiClient, ApiResult};
use crate::model::{Alert, AlertSubscription, AlertUpdate, CreateAlertRequest};

#[derive(Debug, Default)]
struct Cache {
    alerts: Arc<Vec<Alert>>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Cached alert set backed by an [`AlertApiClient`].
#[derive(Clone)]
pub struct AlertStore {
    client: AlertApiClient,
    cache: Arc<RwLock<Cache>>,
    /// Held across fetch and replace.
    refresh_lock: Arc<Mutex<()>>,
}

impl AlertStore {
    /// Create an empty store. Call [`refresh`](Self::refresh) to populate it.
    pub fn new(client: AlertApiClient) -> Self {
        Self {
            client,
            cache: Arc::new(RwLock::new(Cache::default())),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fetch alerts from the backend and replace the cached set.
    ///
    /// Alerts the backend returns with an out-of-range threshold or a blank
    /// location are skipped. On failure the previous set is left untouched and
    /// the error returned. Waits for any refresh already in flight.
    ///
    /// # Returns
    ///
    /// Number of alerts now cached.
    pub async fn refresh(&self) -> ApiResult<usize> {
        let _guard = self.refresh_lock.lock().await;

        let subscriptions = match self.client.get_alerts().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                warn!(
                    error = %e,
                    cached = self.snapshot().len(),
                    "Alert refresh failed, keeping cached alerts"
                );
                return Err(e);
            }
        };

        let alerts: Vec<Alert> = subscriptions
            .into_iter()
            .filter_map(|sub| {
                let id = sub.id.clone();
                Alert::try_from(sub)
                    .inspect_err(|e| warn!(alert_id = %id, error = %e, "Skipping malformed alert"))
                    .ok()
            })
            .collect();

        let count = alerts.len();
        self.replace(alerts);
        info!(count, "Alerts refreshed");

        Ok(count)
    }

    /// The whole cached set, in backend order.
    pub fn snapshot(&self) -> Arc<Vec<Alert>> {
        self.read_cache().alerts.clone()
    }

    /// When the cache was last successfully refreshed.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.read_cache().refreshed_at
    }

    /// Enabled alerts bound to `location`, in cache order.
    pub fn alerts_for(&self, location: &str) -> Vec<Alert> {
        self.snapshot()
            .iter()
            .filter(|alert| alert.enabled && alert.location.matches(location))
            .cloned()
            .collect()
    }

    /// Create an alert through the backend, then refresh the cache.
    pub async fn create(&self, request: &CreateAlertRequest) -> ApiResult<AlertSubscription> {
        let created = self.client.create_alert(request).await?;
        self.refresh_after("create").await;
        Ok(created)
    }

    /// Update an alert through the backend, then refresh the cache.
    pub async fn update(&self, id: &str, update: &AlertUpdate) -> ApiResult<AlertSubscription> {
        let updated = self.client.update_alert(id, update).await?;
        self.refresh_after("update").await;
        Ok(updated)
    }

    /// Delete an alert through the backend, then refresh the cache.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.client.delete_alert(id).await?;
        self.refresh_after("delete").await;
        Ok(())
    }

    /// The mutation already succeeded; a failed refresh only leaves the cache stale.
    async fn refresh_after(&self, operation: &str) {
        if let Err(e) = self.refresh().await {
            warn!(operation, error = %e, "Cache may be stale after alert mutation");
        }
    }

    fn replace(&self, alerts: Vec<Alert>) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.alerts = Arc::new(alerts);
        cache.refreshed_at = Some(Utc::now());
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}
