//! Matting stage CLI
//!
//! Background-removes every acquired image that has no matted output yet.
//! No subcommands; `--force` reprocesses files whose output already exists.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use watchshot::{MattingStage, RemoveBgClient, Settings, TracingConfig, TracingOutput};

/// Remove backgrounds from acquired watch images
#[derive(Parser)]
#[command(name = "watchshot-matte")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source directory of acquired images [default: garmin_watch_images]
    #[arg(short, long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Output directory for matted images [default: garmin_watch_images_nobg]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Reprocess files even when their output already exists
    #[arg(short, long)]
    force: bool,

    /// Log file receiving a copy of all events
    #[arg(long, value_name = "FILE", default_value = "logs/bg_removal.log")]
    log_file: PathBuf,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(parent) = cli.log_file.parent() {
        std::fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let _guard = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_output(TracingOutput::Both(cli.log_file.clone()))
        .init()
        .context("Failed to initialize tracing")?;

    if cli.force {
        info!("Force mode enabled: reprocessing all images regardless of existing outputs");
    }

    let settings = Settings::load();
    let api_key = match settings.require_remove_bg_key() {
        Ok(key) => key.to_string(),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    };

    let source_dir = cli.source_dir.unwrap_or(settings.output_dir);
    let output_dir = cli.output_dir.unwrap_or(settings.matte_dir);

    let stage = MattingStage::new(
        source_dir,
        output_dir,
        cli.force,
        Box::new(RemoveBgClient::new(api_key)),
    );

    match stage.run().await {
        Ok(summary) => {
            info!(
                "Processing complete: processed {}, skipped {}, failed {}",
                summary.processed(),
                summary.skipped(),
                summary.failed()
            );
            Ok(())
        },
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        },
    }
}
