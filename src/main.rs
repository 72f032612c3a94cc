//! Liquidsoap Exporter Binary Entry Point
//!
//! Connects to the Liquidsoap control socket and serves its metrics for
//! Prometheus. Core functionality is provided by the `liquidsoap_exporter`
//! library crate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use liquidsoap_exporter::{
    config::AppConfig,
    lifecycle::Lifecycle,
    liquidsoap::Endpoint,
    service,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Liquidsoap Exporter - Prometheus metrics from the Liquidsoap control socket
#[derive(Parser, Debug)]
#[command(name = "liquidsoap-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "LIQUIDSOAP_EXPORTER_CONFIG")]
    config: Option<String>,

    /// Liquidsoap control socket path (overrides config file)
    #[arg(long, env = "LIQUIDSOAP_EXPORTER_SOCKET", conflicts_with = "tcp")]
    socket: Option<PathBuf>,

    /// Liquidsoap telnet address host:port (overrides config file)
    #[arg(long, env = "LIQUIDSOAP_EXPORTER_TCP")]
    tcp: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "LIQUIDSOAP_EXPORTER_BIND")]
    bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "LIQUIDSOAP_EXPORTER_PORT")]
    port: Option<u16>,

    /// Scrape endpoint path (overrides config file)
    #[arg(long, env = "LIQUIDSOAP_EXPORTER_METRICS_PATH")]
    metrics_path: Option<String>,

    /// Per-command timeout, e.g. `5s` (overrides config file)
    #[arg(long, value_parser = humantime::parse_duration)]
    command_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,liquidsoap_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(path) = cli.socket {
        config.liquidsoap.endpoint = Endpoint::Unix(path);
    }
    if let Some(addr) = cli.tcp {
        config.liquidsoap.endpoint = Endpoint::Tcp(addr);
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.metrics_path {
        config.server.metrics_path = path;
    }
    if let Some(timeout) = cli.command_timeout {
        config.liquidsoap.command_timeout = timeout;
    }
    config.validate()?;

    tracing::info!(
        "Liquidsoap: {}, Server: {}:{}{}",
        config.liquidsoap.endpoint,
        config.server.bind,
        config.server.port,
        config.server.metrics_path,
    );

    let lifecycle = Arc::new(Lifecycle::new());
    tokio::spawn(watch_signals(lifecycle.clone()));

    service::run(&config, lifecycle).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Turn termination signals into stop requests.
///
/// Every signal calls [`Lifecycle::stop`]; only the first one has an effect.
async fn watch_signals(lifecycle: Arc<Lifecycle>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        // SIGABRT has no named SignalKind.
        const SIGABRT: i32 = 6;

        let (mut interrupt, mut terminate, mut abort) = match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::from_raw(SIGABRT)),
        ) {
            (Ok(i), Ok(t), Ok(a)) => (i, t, a),
            _ => {
                tracing::error!("Failed to install signal handlers");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = interrupt.recv() => tracing::info!("Received SIGINT"),
                _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                _ = abort.recv() => tracing::info!("Received SIGABRT"),
            }
            lifecycle.stop();
        }
    }

    #[cfg(not(unix))]
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received Ctrl+C signal");
        lifecycle.stop();
    }
}
