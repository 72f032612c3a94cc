//! Push one blank detection result to a Prometheus push gateway.
//!
//! Meant to be called from Liquidsoap `on_blank` / `on_noise` handlers:
//!
//! ```text
//! silent-check-push --source stream --blank --max-blank 20 --threshold -40
//! ```

use clap::{ArgGroup, Parser};
use liquidsoap_exporter::push::{DEFAULT_GATEWAY, DEFAULT_JOB, NoiseReport, PushGateway};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Receive information from liquidsoap scripts
#[derive(Parser, Debug)]
#[command(name = "silent-check-push", version, about, long_about = None)]
#[command(group(ArgGroup::new("detection").required(true).args(["blank", "noise"])))]
struct Cli {
    /// The name of the source
    #[arg(long, value_name = "stream")]
    source: String,

    /// Specify this flag if blank is detected
    #[arg(long)]
    blank: bool,

    /// Specify this flag if noise is detected
    #[arg(long)]
    noise: bool,

    /// The value of min_noise of the on_blank function in seconds
    #[arg(long, alias = "min_noise", default_value_t = 0.0, allow_negative_numbers = true)]
    min_noise: f64,

    /// The value of max_blank of the on_blank function in seconds
    #[arg(long, alias = "max_blank", default_value_t = 20.0, allow_negative_numbers = true)]
    max_blank: f64,

    /// The value of threshold of the on_blank function in decibels
    #[arg(long, default_value_t = -40.0, allow_negative_numbers = true)]
    threshold: f64,

    /// Push gateway address (host:port or URL)
    #[arg(long, env = "SILENT_CHECK_GATEWAY", default_value = DEFAULT_GATEWAY)]
    gateway: String,

    /// Job name of the pushed group
    #[arg(long, default_value = DEFAULT_JOB)]
    job: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,liquidsoap_exporter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Parsed arguments");

    let report = NoiseReport {
        source: cli.source,
        noise: cli.noise,
        min_noise: cli.min_noise,
        max_blank: cli.max_blank,
        threshold: cli.threshold,
    };

    PushGateway::new(cli.gateway, cli.job).push(&report).await?;
    Ok(())
}
