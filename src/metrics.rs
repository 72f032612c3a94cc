//! Prometheus registry for the exported Liquidsoap metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `liquidsoap_rms` | Gauge | `source` |
//! | `liquidsoap_start_time_seconds` | Gauge | |
//! | `liquidsoap_info` | Gauge (always 1) | `version`, `major`, `minor`, `patch` |
//!
//! The registry is owned by [`ExporterMetrics`]; nothing is registered
//! globally.

use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::liquidsoap::VersionInfo;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Failed to register a metric with Prometheus.
    #[error("failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    /// Failed to encode metrics output.
    #[error("failed to encode metrics: {0}")]
    Encoding(String),
}

/// Gauges published for one engine.
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    rms: GaugeVec,
    start_time: Gauge,
    info: GaugeVec,
}

impl ExporterMetrics {
    /// Create the gauges and register them with a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let rms = GaugeVec::new(
            Opts::new(
                "liquidsoap_rms",
                "The current audio RMS volume of the source.",
            ),
            &["source"],
        )?;
        registry.register(Box::new(rms.clone()))?;

        let start_time = Gauge::new(
            "liquidsoap_start_time_seconds",
            "Start time of the liquidsoap process since unix epoch in seconds.",
        )?;
        registry.register(Box::new(start_time.clone()))?;

        let info = GaugeVec::new(
            Opts::new("liquidsoap_info", "Liquidsoap version information"),
            &["version", "major", "minor", "patch"],
        )?;
        registry.register(Box::new(info.clone()))?;

        Ok(Self {
            registry,
            rms,
            start_time,
            info,
        })
    }

    pub fn set_rms(&self, source: &str, value: f64) {
        self.rms.with_label_values(&[source]).set(value);
    }

    /// Current RMS value of `source`, if one was ever published.
    pub fn rms_value(&self, source: &str) -> Option<f64> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "liquidsoap_rms")
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|label| label.get_name() == "source" && label.get_value() == source)
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Record the engine start time, truncated to whole seconds.
    pub fn set_start_time(&self, start: chrono::DateTime<chrono::Utc>) {
        self.start_time.set(start.timestamp() as f64);
    }

    pub fn start_time(&self) -> f64 {
        self.start_time.get()
    }

    /// Publish the version record. Later calls replace the labels.
    pub fn set_version(&self, version: &VersionInfo) {
        self.info.reset();
        self.info
            .with_label_values(&[
                version.full.as_str(),
                version.major.as_str(),
                version.minor.as_str(),
                version.patch.as_str(),
            ])
            .set(1.0);
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    /// Content type of [`encode_text`](Self::encode_text) output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl std::fmt::Debug for ExporterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterMetrics").finish_non_exhaustive()
    }
}
