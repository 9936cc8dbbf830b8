//! Acquisition stage CLI
//!
//! Walks the watch catalog, searching, downloading, and validating candidate
//! product photos, and persists the first accepted image per item.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use watchshot::{
    AcquisitionConfig, AcquisitionController, CatalogItem, GeminiClassifier, GoogleImageSearch,
    ImageFetcher, Settings, TracingConfig, TracingOutput,
};

/// Acquire one validated product photo per catalog watch
#[derive(Parser)]
#[command(name = "watchshot-acquire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory receiving accepted images [default: garmin_watch_images]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log file receiving a copy of all events
    #[arg(long, value_name = "FILE", default_value = "garmin_photo_download.log")]
    log_file: PathBuf,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_output(TracingOutput::Both(cli.log_file.clone()))
        .init()
        .context("Failed to initialize tracing")?;

    info!("Starting watch image acquisition");

    let settings = Settings::load();
    let api_key = match settings.require_gemini_key() {
        Ok(key) => key.to_string(),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    };

    let output_dir = cli.output_dir.unwrap_or(settings.output_dir);
    let config = AcquisitionConfig::new(output_dir);

    let controller = AcquisitionController::new(
        config,
        Box::new(GoogleImageSearch::new().context("Failed to create search client")?),
        Box::new(ImageFetcher::new().context("Failed to create image fetcher")?),
        Box::new(GeminiClassifier::new(api_key)),
    );

    let summary = controller
        .run(&CatalogItem::music_catalog())
        .await
        .context("Acquisition run failed")?;

    info!(
        "Download complete. Successful: {}, Failed: {}, Skipped: {}",
        summary.successes(),
        summary.failures(),
        summary.skips()
    );

    Ok(())
}
