//! AQI Alerts - edge-triggered air-quality alerting over a remote alert service.
//!
//! # Overview
//!
//! Users define alert rules ("notify me when the AQI in Delhi rises above
//! 150"). The rules live in a remote alert-subscription backend. This crate
//! caches them, watches a stream of per-location AQI readings, and sends one
//! notification each time a reading *crosses* a rule's threshold, rather than
//! on every reading that happens to sit past it.
//!
//! # Flow
//!
//! AQI update -> [`monitor::AlertMonitor`] -> [`crossing::CrossingDetector`]
//! (per alert) -> [`dispatch::Dispatcher`] -> [`dispatch::NotificationSink`].
//!
//! Alert CRUD goes through [`store::AlertStore`] to [`client::AlertApiClient`],
//! which handles auth, timeouts, error classification, and retry.
//!
//! # Modules
//!
//! - [`model`]: Alerts, thresholds, AQI updates, and backend wire types
//! - [`client`]: Resilient alert-subscription API client
//! - [`store`]: Cached alert set with atomic refresh
//! - [`crossing`]: Per-alert crossing state machine
//! - [`dispatch`]: Notification payloads and delivery gating
//! - [`monitor`]: Evaluation of AQI updates against cached alerts
//! - [`feedback`]: User-facing success/failure messages for alert mutations
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod api;
pub mod client;
pub mod config;
pub mod crossing;
pub mod dispatch;
pub mod feedback;
pub mod model;
pub mod monitor;
pub mod store;
