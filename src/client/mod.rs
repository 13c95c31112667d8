//! Client for the remote alert-subscription backend.
//!
//! [`AlertApiClient`] performs the four alert operations (create, list,
//! update, delete) and hides transient failures from callers:
//!
//! - the current bearer token from [`Credentials`] is attached to every attempt
//! - every attempt is bounded by a timeout
//! - non-2xx responses are classified into [`ApiError`]
//! - [`ApiError::Server`] and [`ApiError::Network`] are retried per [`RetryPolicy`]
//!
//! The client holds no alert state. Caching is the job of
//! [`AlertStore`](crate::store::AlertStore).

pub mod error;
pub mod retry;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::model::{AlertSubscription, AlertUpdate, CreateAlertRequest};

pub use error::{ApiError, ApiResult};
pub use retry::RetryPolicy;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared, swappable bearer credential.
///
/// Clones share the same slot, so a login elsewhere is picked up by the next
/// request attempt.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    /// Credentials holding `token`, if it is non-blank.
    pub fn new(token: Option<String>) -> Self {
        let credentials = Self::default();
        if let Some(token) = token {
            credentials.set(&token);
        }
        credentials
    }

    /// Replace the current token. A blank token clears it.
    pub fn set(&self, token: &str) {
        let token = token.trim();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!token.is_empty()).then(|| token.to_string());
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Connection settings for [`AlertApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Backend base URL, e.g. `https://api.example.com/api`.
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientOptions {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Client for the alert-subscription API.
#[derive(Clone)]
pub struct AlertApiClient {
    client: reqwest::Client,
    options: ClientOptions,
    credentials: Credentials,
}

impl AlertApiClient {
    /// Create a client with default timeout and retry policy.
    pub fn new(base_url: &str, credentials: Credentials) -> Self {
        Self::with_options(ClientOptions::new(base_url), credentials)
    }

    pub fn with_options(options: ClientOptions, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            options,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Create an alert.
    ///
    /// The request is validated locally first; a malformed threshold or an
    /// empty channel list fails with [`ApiError::Validation`] without any
    /// network call.
    pub async fn create_alert(
        &self,
        request: &CreateAlertRequest,
    ) -> ApiResult<AlertSubscription> {
        request.validate()?;

        retry::with_retry(&self.options.retry, "create_alert", move || async move {
            let response = self
                .send(self.request(Method::POST, "/alerts").json(request))
                .await?;
            decode(response).await
        })
        .await
    }

    /// Fetch all alerts, in the order the backend returns them.
    ///
    /// Entries that do not decode as an alert are skipped one by one; only a
    /// body that is not a JSON array fails the whole call.
    pub async fn get_alerts(&self) -> ApiResult<Vec<AlertSubscription>> {
        let entries: Vec<Value> =
            retry::with_retry(&self.options.retry, "get_alerts", move || async move {
                let response = self.send(self.request(Method::GET, "/alerts")).await?;
                decode(response).await
            })
            .await?;

        Ok(entries.into_iter().filter_map(decode_subscription).collect())
    }

    /// Apply a partial update to an alert.
    pub async fn update_alert(
        &self,
        id: &str,
        update: &AlertUpdate,
    ) -> ApiResult<AlertSubscription> {
        update.validate()?;
        let path = alert_path(id);
        let path = path.as_str();

        retry::with_retry(&self.options.retry, "update_alert", move || async move {
            let response = self
                .send(self.request(Method::PATCH, path).json(update))
                .await?;
            decode(response).await
        })
        .await
    }

    /// Delete an alert.
    ///
    /// Deleting an id that no longer exists fails with [`ApiError::NotFound`].
    pub async fn delete_alert(&self, id: &str) -> ApiResult<()> {
        let path = alert_path(id);
        let path = path.as_str();

        retry::with_retry(&self.options.retry, "delete_alert", move || async move {
            self.send(self.request(Method::DELETE, path)).await?;
            Ok(())
        })
        .await
    }

    /// Build a request with the timeout and, if present, the bearer token.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.options.base_url, path);
        let builder = self
            .client
            .request(method, url)
            .timeout(self.options.timeout);

        match self.credentials.current() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and classify any failure.
    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body))
    }
}

fn alert_path(id: &str) -> String {
    format!("/alerts/{}", urlencoding::encode(id))
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::from_transport(&e))?;

    serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
        message: e.to_string(),
    })
}

fn decode_subscription(entry: Value) -> Option<AlertSubscription> {
    let id = entry.get("id").map(Value::to_string).unwrap_or_default();
    serde_json::from_value(entry)
        .inspect_err(|e| warn!(alert_id = %id, error = %e, "Skipping undecodable alert"))
        .ok()
}
