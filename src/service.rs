//! Service wiring: startup, serving and ordered shutdown.
//!
//! Startup opens the control connection, runs the collector's one-time
//! startup, then starts serving scrapes. Once a stop is requested:
//!
//! 1. the engine is told goodbye (best effort, after any in-flight sweep)
//! 2. the HTTP server stops accepting and drains open requests
//! 3. the control connection is closed
//! 4. the lifecycle moves to `Stopped`

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::collector::{CollectorError, LevelCommands, RmsCollector};
use crate::config::AppConfig;
use crate::lifecycle::Lifecycle;
use crate::liquidsoap::{LiquidsoapClient, LiquidsoapError, Transport};
use crate::metrics::{ExporterMetrics, MetricsError};
use crate::server::{AppState, create_router_with_path};

/// Errors that abort the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Could not open the control connection.
    #[error(transparent)]
    Connection(#[from] LiquidsoapError),

    /// One-time startup against the engine failed.
    #[error("startup failed: {0}")]
    Startup(#[from] CollectorError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Invalid bind address.
    #[error("invalid listen address '{0}'")]
    Address(String),

    /// HTTP listener failure.
    #[error("http server error: {0}")]
    Http(#[from] std::io::Error),

    /// Shut down because the control connection desynchronized.
    #[error("stopped after unrecoverable failure: {0}")]
    Fault(String),
}

/// Run the exporter until a stop is requested through `lifecycle`.
pub async fn run(config: &AppConfig, lifecycle: Arc<Lifecycle>) -> Result<(), ServiceError> {
    let transport = Transport::connect(
        &config.liquidsoap.endpoint,
        config.liquidsoap.connect_timeout,
    )
    .await?;
    let client = Arc::new(LiquidsoapClient::new(
        transport,
        config.liquidsoap.command_timeout,
    ));

    let collector = match start_collector(config, client.clone()).await {
        Ok(collector) => collector,
        Err(e) => {
            release(&client).await;
            lifecycle.mark_stopped();
            return Err(e);
        }
    };

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = match addr.parse::<SocketAddr>() {
        Ok(addr) => TcpListener::bind(addr).await.map_err(ServiceError::Http),
        Err(_) => Err(ServiceError::Address(addr)),
    };
    let listener = match listener {
        Ok(listener) => listener,
        Err(e) => {
            release(&client).await;
            lifecycle.mark_stopped();
            return Err(e);
        }
    };

    serve(
        client,
        Arc::new(collector),
        listener,
        &config.server.metrics_path,
        lifecycle,
    )
    .await
}

/// Build the collector and run its one-time startup.
pub async fn start_collector(
    config: &AppConfig,
    client: Arc<LiquidsoapClient>,
) -> Result<RmsCollector, ServiceError> {
    let collector = RmsCollector::new(client, ExporterMetrics::new()?)
        .with_level_commands(LevelCommands::new(&config.liquidsoap.rms_suffix))
        .with_listing_command(&config.liquidsoap.listing_command);
    collector.startup().await?;
    Ok(collector)
}

/// Serve scrapes on `listener` until a stop is requested, then shut down in order.
///
/// Returns [`ServiceError::Fault`] after cleanup when the stop was caused by
/// [`Lifecycle::fail`].
pub async fn serve(
    client: Arc<LiquidsoapClient>,
    collector: Arc<RmsCollector>,
    listener: TcpListener,
    metrics_path: &str,
    lifecycle: Arc<Lifecycle>,
) -> Result<(), ServiceError> {
    let state = AppState {
        collector: collector.clone(),
        metrics: collector.metrics().clone(),
        lifecycle: lifecycle.clone(),
    };
    let app = create_router_with_path(state, metrics_path);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Serving metrics on http://{}{}", addr, metrics_path);
    }
    lifecycle.mark_running();

    let goodbye = {
        let client = client.clone();
        let lifecycle = lifecycle.clone();
        async move {
            lifecycle.stop_requested().await;
            tracing::info!("Ending control session...");
            if let Err(e) = client.quit().await {
                tracing::warn!(error = %e, "Failed to end control session");
            }
            tracing::info!("Stopping HTTP server...");
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(goodbye)
        .await;

    release(&client).await;
    lifecycle.mark_stopped();
    served.map_err(ServiceError::Http)?;

    match lifecycle.fault() {
        Some(reason) => Err(ServiceError::Fault(reason.to_string())),
        None => Ok(()),
    }
}

async fn release(client: &LiquidsoapClient) {
    if let Err(e) = client.close().await {
        tracing::warn!(error = %e, "Failed to close control connection");
    }
}
