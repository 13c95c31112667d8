//! Shared helpers for integration tests.
//!
//! [`MockBackend`] is an in-process alert-subscription backend served by axum
//! on an ephemeral port. Responses can be scripted per request to simulate
//! failures; every request is recorded.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aqi_alerts::client::{AlertApiClient, ClientOptions, Credentials, RetryPolicy};
use aqi_alerts::dispatch::{NotificationPayload, NotificationSink};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    alerts: Vec<Value>,
    scripted: VecDeque<(u16, Value)>,
    requests: Vec<RecordedRequest>,
    delay: Option<Duration>,
    next_id: u32,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockBackend {
    pub addr: SocketAddr,
    state: Shared,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A client for this backend with a fast retry policy.
    pub fn client(&self, credentials: Credentials) -> AlertApiClient {
        AlertApiClient::with_options(
            ClientOptions {
                timeout: Duration::from_secs(2),
                retry: fast_retry(),
                ..ClientOptions::new(&self.base_url())
            },
            credentials,
        )
    }

    /// Answer the next request with `status` and `body`, ahead of normal routing.
    pub fn script(&self, status: u16, body: Value) {
        self.state.lock().unwrap().scripted.push_back((status, body));
    }

    /// Delay every response from now on.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Store a raw alert document, bypassing the API and any shape checks.
    pub fn seed_raw(&self, alert: Value) {
        self.state.lock().unwrap().alerts.push(alert);
    }

    /// Store an alert directly, bypassing the API.
    pub fn seed_alert(
        &self,
        location: &str,
        threshold: i64,
        condition: &str,
        channels: &[&str],
        active: bool,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("alert-{}", state.next_id);
        state.alerts.push(json!({
            "id": id,
            "location": location,
            "threshold": threshold,
            "condition": condition,
            "channels": channels,
            "is_active": active,
            "created_at": Utc::now(),
        }));
        id
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter: 0.5,
    }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // The backend state is read and written on arrival; the delay only slows
    // the response down.
    let (delay, response) = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.clone(),
            path: uri.path().to_string(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });

        let response = match state.scripted.pop_front() {
            Some((status, body)) => {
                (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
            }
            None => route(&mut state, &method, uri.path(), &body),
        };
        (state.delay, response)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    response
}

fn route(state: &mut MockState, method: &Method, path: &str, body: &[u8]) -> Response {
    match (method.as_str(), path.strip_prefix("/alerts")) {
        ("GET", Some("")) => Json(Value::Array(state.alerts.clone())).into_response(),
        ("POST", Some("")) => {
            let request: Value = serde_json::from_slice(body).unwrap();
            state.next_id += 1;
            let alert = json!({
                "id": format!("alert-{}", state.next_id),
                "location": request["location"],
                "threshold": request["threshold"],
                "condition": request["condition"],
                "channels": request["notificationChannels"],
                "is_active": true,
                "created_at": Utc::now(),
            });
            state.alerts.push(alert.clone());
            (StatusCode::CREATED, Json(alert)).into_response()
        }
        ("PATCH", Some(rest)) => {
            let id = rest.trim_start_matches('/');
            let update: Value = serde_json::from_slice(body).unwrap();
            let Some(alert) = state.alerts.iter_mut().find(|a| a["id"] == id) else {
                return not_found();
            };
            for (field, wire) in [
                ("threshold", "threshold"),
                ("condition", "condition"),
                ("notificationChannels", "channels"),
                ("is_active", "is_active"),
            ] {
                if let Some(value) = update.get(field) {
                    alert[wire] = value.clone();
                }
            }
            Json(alert.clone()).into_response()
        }
        ("DELETE", Some(rest)) => {
            let id = rest.trim_start_matches('/');
            let before = state.alerts.len();
            state.alerts.retain(|a| a["id"] != id);
            if state.alerts.len() == before {
                not_found()
            } else {
                StatusCode::NO_CONTENT.into_response()
            }
        }
        _ => not_found(),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Alert not found" })),
    )
        .into_response()
}

/// Sink that records every delivered notification.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<NotificationPayload>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<NotificationPayload> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, payload: &NotificationPayload) {
        self.delivered.lock().unwrap().push(payload.clone());
    }
}
