//! Collector Layer
//!
//! Turns engine replies into exported metrics. The scrape endpoint drives
//! collection on demand; nothing runs in the background.
//!
//! - [`Collector`]: trait the scrape endpoint calls once per request
//! - [`RmsCollector`]: discovers sources at startup, then publishes their RMS levels
//! - [`LevelCommands`]: naming convention of the per-source level commands
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use liquidsoap_exporter::collector::{Collector, RmsCollector};
//! use liquidsoap_exporter::liquidsoap::{Endpoint, LiquidsoapClient, Transport};
//! use liquidsoap_exporter::metrics::ExporterMetrics;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::Unix("./silent-check.sock".into());
//! let transport = Transport::connect(&endpoint, Duration::from_secs(5)).await?;
//! let client = Arc::new(LiquidsoapClient::new(transport, Duration::from_secs(5)));
//! let collector = RmsCollector::new(client, ExporterMetrics::new()?);
//! collector.startup().await?;
//! collector.collect().await?;
//! # Ok(())
//! # }
//! ```

mod rms;
mod sources;
mod traits;

pub use rms::{DEFAULT_LISTING_COMMAND, RmsCollector};
pub use sources::{LEVEL_COMMAND_EXTENSION, LISTING_PREFIX, LevelCommands};
pub use traits::{Collector, CollectorError};
