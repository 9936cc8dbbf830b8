//! Background-removal post-processing of accepted images
//!
//! An independently run stage that consumes the acquisition output directory.
//! The output directory listing is snapshotted once before the loop and used
//! to decide skip/process; files appearing mid-run are not seen. That
//! staleness window is intentional, matching the one-shot batch character of
//! the stage.

use crate::error::{Result, WatchshotError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Source formats eligible for matting
pub const SUPPORTED_MATTE_FORMATS: &[&str] = &[".png", ".jpg", ".jpeg"];

/// Suffix inserted before the `.png` extension of matted outputs
pub const MATTE_SUFFIX: &str = "_nobg";

/// remove.bg API endpoint
const REMOVE_BG_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Per-file outcome of a matting run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MattingStatus {
    /// Background removed and output written
    Processed,
    /// Output already existed and force was off; no network call made
    Skipped,
    /// Read, call, or write failure; the run continued
    Failed,
}

/// Record emitted exactly once per eligible source file
#[derive(Debug, Clone)]
pub struct MattingRecord {
    /// Source file name within the source directory
    pub source_file_name: String,
    /// Derived output file name
    pub output_file_name: String,
    /// Outcome for this file
    pub status: MattingStatus,
}

/// Run-level tally over all eligible source files
#[derive(Debug, Default)]
pub struct MattingSummary {
    /// Per-file records in processing order
    pub records: Vec<MattingRecord>,
}

impl MattingSummary {
    /// Files whose background was removed this run
    #[must_use]
    pub fn processed(&self) -> usize {
        self.count(MattingStatus::Processed)
    }

    /// Files skipped because their output already existed
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(MattingStatus::Skipped)
    }

    /// Files that failed and were passed over
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(MattingStatus::Failed)
    }

    fn count(&self, status: MattingStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

/// Port for the external background-removal capability
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background from `image_bytes`, returning PNG bytes
    ///
    /// # Errors
    /// - Transport failures or API error responses
    async fn remove_background(
        &self,
        image_bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<Vec<u8>>;
}

/// remove.bg-backed implementation of [`BackgroundRemover`]
#[derive(Debug, Clone)]
pub struct RemoveBgClient {
    client: reqwest::Client,
    api_key: String,
}

impl RemoveBgClient {
    /// Create a client using the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove_background(
        &self,
        image_bytes: &[u8],
        file_name: &str,
        content_type: &str,
    ) -> Result<Vec<u8>> {
        let part = reqwest::multipart::Part::bytes(image_bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| WatchshotError::matting(format!("Invalid content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("image_file", part);

        let response = self
            .client
            .post(REMOVE_BG_ENDPOINT)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WatchshotError::matting(format!("Background removal request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| WatchshotError::matting(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(WatchshotError::matting(describe_error_body(
                status.as_u16(),
                &body,
            )));
        }

        Ok(body.to_vec())
    }
}

/// Render an API failure body for logging
///
/// The API returns a JSON envelope with an `errors` field on failure; anything
/// else is surfaced as raw text.
pub(crate) fn describe_error_body(status: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(envelope) if envelope.get("errors").is_some() => {
            format!("API error ({}): {}", status, envelope["errors"])
        },
        _ => format!("API error ({}): {}", status, String::from_utf8_lossy(body)),
    }
}

/// Derive the matted output file name for a source file
#[must_use]
pub fn matte_output_name(source_file_name: &str) -> String {
    let stem = Path::new(source_file_name)
        .file_stem()
        .map_or_else(|| source_file_name.to_string(), |s| s.to_string_lossy().into_owned());
    format!("{stem}{MATTE_SUFFIX}.png")
}

/// Content-type hint derived from the source extension
fn content_type_for(source_file_name: &str) -> String {
    let ext = Path::new(source_file_name)
        .extension()
        .map_or_else(String::new, |e| e.to_string_lossy().to_lowercase());
    format!("image/{ext}")
}

/// Whether a file name carries a supported matting source extension
fn is_supported_source(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_MATTE_FORMATS.iter().any(|ext| lower.ends_with(ext))
}

/// Walks the source directory and mattes every unprocessed image
pub struct MattingStage {
    source_dir: PathBuf,
    output_dir: PathBuf,
    force: bool,
    remover: Box<dyn BackgroundRemover>,
}

impl MattingStage {
    /// Create a stage over the given directories and remover port
    ///
    /// With `force` set, pre-existing outputs are regenerated instead of
    /// skipped.
    pub fn new(
        source_dir: PathBuf,
        output_dir: PathBuf,
        force: bool,
        remover: Box<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            source_dir,
            output_dir,
            force,
            remover,
        }
    }

    /// Process every supported source file, one at a time
    ///
    /// # Errors
    /// - Source directory missing (fatal, nothing processed)
    /// - Output directory cannot be created or listed
    pub async fn run(&self) -> Result<MattingSummary> {
        if !self.source_dir.exists() {
            return Err(WatchshotError::configuration(format!(
                "Source directory does not exist: {}",
                self.source_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            WatchshotError::file_io_error("create matte output directory", &self.output_dir, &e)
        })?;

        // One-time snapshot; deliberately not re-queried during the loop
        let existing_outputs = self.snapshot_output_dir()?;
        let source_files = self.list_source_files()?;
        let total = source_files.len();

        info!(
            count = total,
            source = %self.source_dir.display(),
            force = self.force,
            "Starting background removal"
        );

        let mut summary = MattingSummary::default();
        for (index, file_name) in source_files.iter().enumerate() {
            let output_name = matte_output_name(file_name);

            if !self.force && existing_outputs.contains(&output_name.to_lowercase()) {
                info!("[{}/{}] Skipping {} (already processed)", index + 1, total, file_name);
                summary.records.push(MattingRecord {
                    source_file_name: file_name.clone(),
                    output_file_name: output_name,
                    status: MattingStatus::Skipped,
                });
                continue;
            }

            info!("[{}/{}] Processing {}", index + 1, total, file_name);
            let status = self.matte_file(file_name, &output_name).await;
            summary.records.push(MattingRecord {
                source_file_name: file_name.clone(),
                output_file_name: output_name,
                status,
            });
        }

        info!(
            processed = summary.processed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Background removal complete"
        );
        Ok(summary)
    }

    /// Matte one file; failures are contained to that file
    async fn matte_file(&self, file_name: &str, output_name: &str) -> MattingStatus {
        let source_path = self.source_dir.join(file_name);
        let output_path = self.output_dir.join(output_name);

        let bytes = match tokio::fs::read(&source_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(path = %source_path.display(), error = %e, "Failed to read source image");
                return MattingStatus::Failed;
            },
        };

        let matted = match self
            .remover
            .remove_background(&bytes, file_name, &content_type_for(file_name))
            .await
        {
            Ok(matted) => matted,
            Err(e) => {
                error!(file = %file_name, error = %e, "Background removal failed");
                return MattingStatus::Failed;
            },
        };

        match tokio::fs::write(&output_path, &matted).await {
            Ok(()) => {
                info!(path = %output_path.display(), "Saved matted image");
                MattingStatus::Processed
            },
            Err(e) => {
                error!(path = %output_path.display(), error = %e, "Failed to write matted image");
                MattingStatus::Failed
            },
        }
    }

    /// Lowercased names currently in the output directory
    fn snapshot_output_dir(&self) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let entries = std::fs::read_dir(&self.output_dir).map_err(|e| {
            WatchshotError::file_io_error("list matte output directory", &self.output_dir, &e)
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                WatchshotError::file_io_error("list matte output directory", &self.output_dir, &e)
            })?;
            names.insert(entry.file_name().to_string_lossy().to_lowercase());
        }
        Ok(names)
    }

    /// Supported source files in deterministic (sorted) order
    fn list_source_files(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.source_dir).map_err(|e| {
            WatchshotError::file_io_error("list matte source directory", &self.source_dir, &e)
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                WatchshotError::file_io_error("list matte source directory", &self.source_dir, &e)
            })?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_supported_source(&name) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }
}
