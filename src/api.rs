//! HTTP API handlers.
//!
//! - **POST /aqi**: AQI feed ingress. Evaluates the reading against cached
//!   alerts and returns the notifications that were dispatched.
//! - **GET /alerts**: The cached alert set.
//! - **POST /alerts/refresh**: Re-fetch alerts from the backend. On failure
//!   the cached set is kept.
//! - **POST /alerts**, **PATCH /alerts/:id**, **DELETE /alerts/:id**: Alert
//!   mutations proxied to the backend, answered with a [`Feedback`] message.
//! - **GET /health**: Health check.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::client::ApiError;
use crate::dispatch::NotificationPayload;
use crate::feedback::Feedback;
use crate::model::{Alert, AlertSubscription, AlertUpdate, AqiUpdate, CreateAlertRequest};
use crate::monitor::AlertMonitor;
use crate::store::AlertStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: AlertStore,
    pub monitor: Arc<Mutex<AlertMonitor>>,
}

impl AppState {
    pub fn new(monitor: AlertMonitor) -> Self {
        Self {
            store: monitor.store().clone(),
            monitor: Arc::new(Mutex::new(monitor)),
        }
    }
}

/// Build the router for all endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/aqi", post(post_aqi))
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/refresh", post(refresh_alerts))
        .route("/alerts/:id", patch(update_alert).delete(delete_alert))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Response for POST /aqi.
#[derive(Debug, Serialize)]
pub struct AqiResponse {
    pub location: String,
    pub aqi: u16,
    pub dispatched: Vec<NotificationPayload>,
}

/// Response for GET /alerts.
#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Response for POST /alerts/refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// Response for alert mutations.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub feedback: Feedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertSubscription>,
}

/// POST /aqi - Evaluate an AQI reading.
///
/// # Request Body
///
/// ```json
/// {
///     "location": "Delhi",
///     "aqi": 155,
///     "category": "Unhealthy"
/// }
/// ```
///
/// `category` is optional and derived from the AQI when absent.
#[instrument(skip(state))]
pub async fn post_aqi(
    State(state): State<AppState>,
    Json(update): Json<AqiUpdate>,
) -> Json<AqiResponse> {
    let dispatched = {
        let mut monitor = state.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        monitor.handle_update(&update)
    };

    info!(
        location = %update.location,
        aqi = update.aqi,
        dispatched = dispatched.len(),
        "AQI update received"
    );

    Json(AqiResponse {
        location: update.location,
        aqi: update.aqi,
        dispatched,
    })
}

/// GET /alerts - The cached alert set.
pub async fn list_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    Json(AlertsResponse {
        alerts: state.store.snapshot().as_ref().clone(),
        refreshed_at: state.store.refreshed_at(),
    })
}

/// POST /alerts/refresh - Re-fetch alerts from the backend.
#[instrument(skip(state))]
pub async fn refresh_alerts(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<Feedback>)> {
    match state.store.refresh().await {
        Ok(count) => Ok(Json(RefreshResponse { count })),
        Err(e) => Err((StatusCode::BAD_GATEWAY, Json(Feedback::failure(&e, Utc::now())))),
    }
}

/// POST /alerts - Create an alert.
#[instrument(skip(state))]
pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> impl IntoResponse {
    let result = state.store.create(&request).await;
    mutation_response(result, "Alert created", StatusCode::CREATED)
}

/// PATCH /alerts/:id - Update an alert.
#[instrument(skip(state))]
pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AlertUpdate>,
) -> impl IntoResponse {
    let result = state.store.update(&id, &update).await;
    mutation_response(result, "Alert updated", StatusCode::OK)
}

/// DELETE /alerts/:id - Delete an alert.
#[instrument(skip(state))]
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let result = state
        .store
        .delete(&id)
        .await
        .map(|()| None::<AlertSubscription>);
    mutation_response(result, "Alert deleted", StatusCode::OK)
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn mutation_response<A: Into<Option<AlertSubscription>>>(
    result: Result<A, ApiError>,
    success_message: &str,
    success_status: StatusCode,
) -> (StatusCode, Json<MutationResponse>) {
    let now = Utc::now();
    match result {
        Ok(alert) => (
            success_status,
            Json(MutationResponse {
                feedback: Feedback::success(success_message, now),
                alert: alert.into(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Alert mutation failed");
            (
                status_for(&e),
                Json(MutationResponse {
                    feedback: Feedback::failure(&e, now),
                    alert: None,
                }),
            )
        }
    }
}

/// HTTP status reported to our caller for a backend failure.
fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
        ApiError::Auth { .. } => StatusCode::UNAUTHORIZED,
        ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
        ApiError::Conflict { .. } => StatusCode::CONFLICT,
        ApiError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
        ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ApiError::Server { .. } | ApiError::Network { .. } | ApiError::InvalidResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}
