#![allow(clippy::uninlined_format_args)]

//! # watchshot
//!
//! Two-stage pipeline that builds a clean set of front-facing product photos
//! for a fixed catalog of Garmin watches.
//!
//! **Stage 1 — acquisition** (`watchshot-acquire`): for each catalog item,
//! query an image search surface for up to three candidate URLs, download
//! each candidate with fallback, validate it against a strict product-photo
//! rubric via an external vision classifier, and persist the first accepted
//! candidate under a deterministic FileKey name. Items with an existing
//! canonical file are skipped without any network traffic.
//!
//! **Stage 2 — matting** (`watchshot-matte`): independently background-remove
//! every accepted image that has not been processed yet (or all of them with
//! `--force`), writing `<basename>_nobg.png` outputs.
//!
//! External capabilities sit behind narrow ports ([`CandidateSource`],
//! [`CandidateFetcher`], [`ImageClassifier`], [`BackgroundRemover`]) so the
//! orchestration logic is testable with deterministic fakes and providers can
//! be swapped without touching the state machine.
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use watchshot::{
//!     AcquisitionConfig, AcquisitionController, CatalogItem,
//!     GeminiClassifier, GoogleImageSearch, ImageFetcher,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AcquisitionConfig::new("garmin_watch_images".into());
//! let controller = AcquisitionController::new(
//!     config,
//!     Box::new(GoogleImageSearch::new()?),
//!     Box::new(ImageFetcher::new()?),
//!     Box::new(GeminiClassifier::new("api-key")),
//! );
//! let summary = controller.run(&CatalogItem::music_catalog()).await?;
//! println!("acquired {} images", summary.successes());
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod matting;
pub mod tracing_config;

pub use acquire::{
    AcquisitionConfig, AcquisitionController, AcquisitionResult, AcquisitionStatus, RunSummary,
};
pub use catalog::{sanitize_file_stem, CatalogItem};
pub use classify::{GeminiClassifier, ImageClassifier, Verdict};
pub use config::Settings;
pub use discovery::{Candidate, CandidateSource, GoogleImageSearch};
pub use error::{Result, WatchshotError};
pub use fetch::{
    append_extension, infer_extension, Artifact, CandidateFetcher, ImageFetcher, VALID_EXTENSIONS,
};
pub use matting::{
    matte_output_name, BackgroundRemover, MattingRecord, MattingStage, MattingStatus,
    MattingSummary, RemoveBgClient,
};
pub use tracing_config::{TracingConfig, TracingOutput};
