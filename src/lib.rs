//! Liquidsoap Exporter Library
//!
//! Bridges the line-oriented control protocol of a Liquidsoap engine to a
//! Prometheus scrape endpoint. On every scrape the exporter queries the
//! engine over its control socket and republishes the replies as gauges.
//!
//! # Architecture
//!
//! - **Liquidsoap**: transport and serialized command/response client
//! - **Collector**: source discovery, startup metrics, per-scrape RMS levels
//! - **Metrics**: explicitly owned Prometheus registry
//! - **Server**: Axum scrape endpoint and liveness probe
//! - **Lifecycle / Service**: startup and ordered, exactly-once shutdown
//! - **Push**: one-shot push gateway reporter used by `silent-check-push`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use liquidsoap_exporter::{AppConfig, Lifecycle, service};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/config.yaml")?;
//! let lifecycle = Arc::new(Lifecycle::new());
//! service::run(&config, lifecycle).await?;
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod lifecycle;
pub mod liquidsoap;
pub mod metrics;
pub mod push;
pub mod server;
pub mod service;

pub use collector::{Collector, CollectorError, RmsCollector};
pub use config::AppConfig;
pub use lifecycle::{Lifecycle, LifecycleState};
pub use liquidsoap::{Endpoint, LiquidsoapClient, LiquidsoapError, Transport};
pub use metrics::ExporterMetrics;
