//! RMS level collector for every source the engine exposes.

use std::sync::{Arc, OnceLock};

use crate::collector::sources::LevelCommands;
use crate::collector::{Collector, CollectorError};
use crate::liquidsoap::LiquidsoapClient;
use crate::metrics::ExporterMetrics;

/// Default command that lists the engine's commands.
pub const DEFAULT_LISTING_COMMAND: &str = "help";

/// Queries every discovered source's level and publishes it.
///
/// Sources are discovered once by [`startup`](RmsCollector::startup) and are
/// read-only afterwards.
pub struct RmsCollector {
    client: Arc<LiquidsoapClient>,
    metrics: ExporterMetrics,
    commands: LevelCommands,
    listing_command: String,
    sources: OnceLock<Vec<String>>,
}

impl RmsCollector {
    pub fn new(client: Arc<LiquidsoapClient>, metrics: ExporterMetrics) -> Self {
        Self {
            client,
            metrics,
            commands: LevelCommands::default(),
            listing_command: DEFAULT_LISTING_COMMAND.to_string(),
            sources: OnceLock::new(),
        }
    }

    /// Set the level command convention.
    pub fn with_level_commands(mut self, commands: LevelCommands) -> Self {
        self.commands = commands;
        self
    }

    /// Set the command used to list sources.
    pub fn with_listing_command(mut self, command: impl Into<String>) -> Self {
        self.listing_command = command.into();
        self
    }

    /// Discovered sources; empty before startup.
    pub fn sources(&self) -> &[String] {
        self.sources.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Query the listing and derive the source names from it.
    pub async fn discover_sources(&self) -> Result<Vec<String>, CollectorError> {
        let listing = self.client.send_command(&self.listing_command).await?;
        Ok(self.commands.discover(&listing))
    }

    /// One-time startup: discover sources, then export start time and version.
    ///
    /// Unrecognized uptime or version replies leave that metric unset.
    /// Connection failures abort startup.
    pub async fn startup(&self) -> Result<(), CollectorError> {
        tracing::debug!("Retrieving sources");
        let sources = self.discover_sources().await?;
        tracing::info!(count = sources.len(), sources = ?sources, "Discovered sources");
        if self.sources.set(sources).is_err() {
            tracing::warn!("Sources already discovered, keeping the first listing");
        }

        tracing::debug!("Exporting start time");
        match self.client.uptime().await? {
            Some(start) => self.metrics.set_start_time(start),
            None => tracing::warn!("Start time unknown, leaving it unset"),
        }

        tracing::debug!("Exporting version information");
        match self.client.version().await? {
            Some(version) => {
                tracing::info!(version = %version.full, "Engine version");
                self.metrics.set_version(&version);
            }
            None => tracing::warn!("Version unknown, leaving it unset"),
        }

        Ok(())
    }
}

impl std::fmt::Debug for RmsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmsCollector")
            .field("commands", &self.commands)
            .field("listing_command", &self.listing_command)
            .field("sources", &self.sources.get())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for RmsCollector {
    fn name(&self) -> &str {
        "rms"
    }

    async fn collect(&self) -> Result<(), CollectorError> {
        let sources = self.sources.get().ok_or(CollectorError::NotStarted)?;

        // One session for the whole sweep: concurrent scrapes queue behind it
        // and shutdown waits for it.
        let mut values = Vec::with_capacity(sources.len());
        {
            let mut session = self.client.session().await;
            for source in sources {
                let reply = session.send_command(&self.commands.query(source)).await?;
                let value = reply
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| CollectorError::Parse {
                        name: source.clone(),
                        reply: reply.trim().to_string(),
                    })?;
                values.push((source, value));
            }
        }

        for (source, value) in values {
            self.metrics.set_rms(source, value);
        }
        tracing::debug!(sources = sources.len(), "Collected RMS levels");
        Ok(())
    }
}
