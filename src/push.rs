//! One-shot blank detection report for a Prometheus push gateway.
//!
//! Liquidsoap scripts call `silent-check-push` from their `on_blank`
//! handlers. Each call replaces the group `job=<job>, source=<source>` on the
//! gateway with a single `silent_check_stream_noise` sample.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

/// Default push gateway address.
pub const DEFAULT_GATEWAY: &str = "localhost:9091";

/// Default job name of the pushed group.
pub const DEFAULT_JOB: &str = "silent_checker";

/// Errors that can occur while pushing a report.
#[derive(Debug, Error)]
pub enum PushError {
    /// The report cannot be expressed as a push gateway group.
    #[error("invalid report: {0}")]
    Invalid(String),

    #[error("failed to build metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to reach push gateway: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("push gateway returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Outcome of one `on_blank` detection together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseReport {
    pub source: String,
    /// `true` when noise is present, `false` when the source went blank.
    pub noise: bool,
    /// Seconds of noise required before the source counts as active again.
    pub min_noise: f64,
    /// Seconds of silence before the source counts as blank.
    pub max_blank: f64,
    /// Level in dB below which audio counts as silence.
    pub threshold: f64,
}

impl NoiseReport {
    /// Encode the report as Prometheus text in its own registry.
    pub fn encode(&self) -> Result<String, PushError> {
        let registry = Registry::new();
        let gauge = GaugeVec::new(
            Opts::new(
                "silent_check_stream_noise",
                "Result of liquidsoap stream blank detection",
            ),
            &["source", "min_noise", "max_blank", "threshold"],
        )?;
        registry.register(Box::new(gauge.clone()))?;

        let (min_noise, max_blank, threshold) = (
            float_label(self.min_noise),
            float_label(self.max_blank),
            float_label(self.threshold),
        );
        gauge
            .with_label_values(&[
                self.source.as_str(),
                min_noise.as_str(),
                max_blank.as_str(),
                threshold.as_str(),
            ])
            .set(if self.noise { 1.0 } else { 0.0 });

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| PushError::Invalid(e.to_string()))
    }
}

/// Label text for a float, always with a fractional part (`20.0`, not `20`).
fn float_label(value: f64) -> String {
    format!("{value:?}")
}

/// Client for one push gateway job.
#[derive(Debug, Clone)]
pub struct PushGateway {
    address: String,
    job: String,
    http: reqwest::Client,
}

impl PushGateway {
    /// `address` is `host:port` or a full `http(s)://` base URL.
    pub fn new(address: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            job: job.into(),
            http: reqwest::Client::new(),
        }
    }

    /// URL of the group a report for `source` replaces.
    pub fn group_url(&self, source: &str) -> Result<String, PushError> {
        if source.is_empty() || source.contains('/') {
            return Err(PushError::Invalid(format!("unsupported source name '{source}'")));
        }
        if self.job.is_empty() || self.job.contains('/') {
            return Err(PushError::Invalid(format!("unsupported job name '{}'", self.job)));
        }

        let address = self.address.trim_end_matches('/');
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        Ok(format!("{base}/metrics/job/{}/source/{source}", self.job))
    }

    /// Replace the report's group on the gateway.
    pub async fn push(&self, report: &NoiseReport) -> Result<(), PushError> {
        let url = self.group_url(&report.source)?;
        let body = report.encode()?;

        tracing::debug!(
            url = %url,
            source = %report.source,
            noise = report.noise,
            "Pushing report"
        );
        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, prometheus::TEXT_FORMAT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Status { status, body });
        }
        tracing::info!(source = %report.source, noise = report.noise, "Report pushed");
        Ok(())
    }
}
