//! AQI Alerts - edge-triggered air-quality alerting over a remote alert service.
//!
//! # API Endpoints
//!
//! - `POST /aqi` - Evaluate an AQI reading for a location
//! - `GET /alerts` - Cached alerts
//! - `POST /alerts/refresh` - Re-fetch alerts from the backend
//! - `POST /alerts`, `PATCH /alerts/:id`, `DELETE /alerts/:id` - Alert mutations
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use aqi_alerts::api::{AppState, router};
use aqi_alerts::client::{AlertApiClient, Credentials};
use aqi_alerts::config::Config;
use aqi_alerts::dispatch::{Dispatcher, LogSink, NotificationSink, WebhookSink};
use aqi_alerts::monitor::AlertMonitor;
use aqi_alerts::store::AlertStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("aqi_alerts=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        port = config.port,
        api_url = %config.api_url,
        authenticated = config.api_token.is_some(),
        permission = ?config.notification_permission,
        "Starting AQI alerts server"
    );

    let credentials = Credentials::new(config.api_token.clone());
    let client = AlertApiClient::with_options(config.client_options(), credentials);
    let store = AlertStore::new(client);

    // Serve whatever we have; the cache can be refreshed later.
    if let Err(e) = store.refresh().await {
        warn!(error = %e, "Initial alert refresh failed, starting with an empty cache");
    }

    let sink: Arc<dyn NotificationSink> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url)),
        None => Arc::new(LogSink),
    };
    let mut dispatcher = Dispatcher::new(sink, config.notification_permission);
    if let Some(icon) = &config.notification_icon {
        dispatcher = dispatcher.with_icon(icon);
    }
    let state = AppState::new(AlertMonitor::new(store, dispatcher));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "AQI alerts server is listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
