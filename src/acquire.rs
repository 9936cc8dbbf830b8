//! Per-item acquisition state machine and run loop
//!
//! For each catalog item: skip if a canonical file already exists, otherwise
//! search for up to three candidates and walk them in order — download,
//! classify, then rename (accept) or delete (reject). The first accepted
//! candidate wins. Every per-candidate failure is contained to that
//! candidate, every per-item failure to that item; fixed delays between
//! attempts and between items keep load on the third-party hosts bounded.

use crate::catalog::CatalogItem;
use crate::classify::{ImageClassifier, Verdict};
use crate::discovery::{Candidate, CandidateSource};
use crate::error::{Result, WatchshotError};
use crate::fetch::{append_extension, CandidateFetcher, VALID_EXTENSIONS};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Terminal status for one catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStatus {
    /// A candidate was accepted and persisted under the canonical name
    Success,
    /// No candidate was found or accepted
    Failed,
    /// A canonical file already existed; no network calls were made
    Skipped,
}

/// Outcome record emitted exactly once per catalog item
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    /// Canonical filename stem for the item
    pub file_key: String,
    /// Terminal status
    pub status: AcquisitionStatus,
    /// Canonical file path, present for `Success` and `Skipped`
    pub final_path: Option<PathBuf>,
}

/// Tunables for an acquisition run
///
/// The delay defaults are a politeness contract towards the search and image
/// hosts, not adaptive backoff; tests zero them.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Directory receiving canonical images
    pub output_dir: PathBuf,
    /// Maximum candidates attempted per item
    pub max_candidates: usize,
    /// Fixed delay between candidate attempts within an item
    pub candidate_delay: Duration,
    /// Fixed delay between items
    pub item_delay: Duration,
}

impl AcquisitionConfig {
    /// Config with the contract defaults: 3 candidates, 2 s / 3 s delays
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            max_candidates: 3,
            candidate_delay: Duration::from_secs(2),
            item_delay: Duration::from_secs(3),
        }
    }
}

/// Tally of terminal statuses for a whole run, in catalog order
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Per-item results, catalog order
    pub results: Vec<AcquisitionResult>,
}

impl RunSummary {
    /// Number of items that acquired an image this run
    #[must_use]
    pub fn successes(&self) -> usize {
        self.count(AcquisitionStatus::Success)
    }

    /// Number of items that exhausted their candidates
    #[must_use]
    pub fn failures(&self) -> usize {
        self.count(AcquisitionStatus::Failed)
    }

    /// Number of items skipped because a file already existed
    #[must_use]
    pub fn skips(&self) -> usize {
        self.count(AcquisitionStatus::Skipped)
    }

    fn count(&self, status: AcquisitionStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Drives the per-item state machine over the external ports
pub struct AcquisitionController {
    config: AcquisitionConfig,
    source: Box<dyn CandidateSource>,
    fetcher: Box<dyn CandidateFetcher>,
    classifier: Box<dyn ImageClassifier>,
}

impl AcquisitionController {
    /// Create a controller over the given ports
    pub fn new(
        config: AcquisitionConfig,
        source: Box<dyn CandidateSource>,
        fetcher: Box<dyn CandidateFetcher>,
        classifier: Box<dyn ImageClassifier>,
    ) -> Self {
        Self {
            config,
            source,
            fetcher,
            classifier,
        }
    }

    /// Process every catalog item in order, one at a time
    ///
    /// Each item's result is finalized before the next item begins; the run
    /// never aborts on a per-item failure.
    ///
    /// # Errors
    /// - Output directory cannot be created
    pub async fn run(&self, catalog: &[CatalogItem]) -> Result<RunSummary> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| {
                WatchshotError::file_io_error("create output directory", &self.config.output_dir, &e)
            })?;

        let mut summary = RunSummary::default();
        for (index, item) in catalog.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.item_delay).await;
            }
            summary.results.push(self.acquire_item(item).await);
        }

        info!(
            successes = summary.successes(),
            failures = summary.failures(),
            skips = summary.skips(),
            "Acquisition run complete"
        );
        Ok(summary)
    }

    /// Run the state machine for one catalog item
    pub async fn acquire_item(&self, item: &CatalogItem) -> AcquisitionResult {
        let file_key = item.file_key();
        let label = item.full_name();

        if let Some(existing) = self.existing_image_path(&file_key) {
            info!(file_key = %file_key, path = %existing.display(), "Image already exists, skipping");
            return AcquisitionResult {
                file_key,
                status: AcquisitionStatus::Skipped,
                final_path: Some(existing),
            };
        }

        // A failed search degrades to "no candidates" rather than aborting
        let candidates = match self
            .source
            .find(&item.search_query(), self.config.max_candidates)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(file_key = %file_key, error = %e, "Candidate search failed");
                Vec::new()
            },
        };

        if candidates.is_empty() {
            warn!(file_key = %file_key, "No candidates found");
            return AcquisitionResult {
                file_key,
                status: AcquisitionStatus::Failed,
                final_path: None,
            };
        }

        for (attempt, candidate) in candidates
            .iter()
            .take(self.config.max_candidates)
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(self.config.candidate_delay).await;
            }

            match self
                .try_candidate(&file_key, &label, candidate, attempt)
                .await
            {
                Ok(Some(final_path)) => {
                    info!(file_key = %file_key, path = %final_path.display(), "Valid image saved");
                    return AcquisitionResult {
                        file_key,
                        status: AcquisitionStatus::Success,
                        final_path: Some(final_path),
                    };
                },
                Ok(None) => {},
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Candidate attempt failed");
                    self.cleanup_temp(&file_key, attempt).await;
                },
            }
        }

        warn!(file_key = %file_key, "No valid image found after trying all candidates");
        AcquisitionResult {
            file_key,
            status: AcquisitionStatus::Failed,
            final_path: None,
        }
    }

    /// Canonical file for `file_key` with any whitelisted extension, if present
    ///
    /// Presence-only check: a zero-byte or corrupt file still counts as
    /// already acquired.
    #[must_use]
    pub fn existing_image_path(&self, file_key: &str) -> Option<PathBuf> {
        VALID_EXTENSIONS
            .iter()
            .map(|ext| self.config.output_dir.join(format!("{file_key}{ext}")))
            .find(|path| path.exists())
    }

    /// Download, classify, and finalize one candidate
    ///
    /// Returns `Ok(Some(path))` on acceptance, `Ok(None)` when the candidate
    /// was rejected or failed to download (the loop continues), and `Err` for
    /// unexpected filesystem failures (caller cleans up the temp artifact).
    async fn try_candidate(
        &self,
        file_key: &str,
        label: &str,
        candidate: &Candidate,
        attempt: usize,
    ) -> Result<Option<PathBuf>> {
        let temp_stem = self.config.output_dir.join(format!("{file_key}_tmp{attempt}"));

        let artifact = match self.fetcher.fetch(&candidate.url, &temp_stem).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Failed to download candidate");
                return Ok(None);
            },
        };

        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|e| WatchshotError::file_io_error("read downloaded artifact", &artifact.path, &e))?;

        // Fail closed: a classifier error rejects the candidate
        let verdict = match self.classifier.classify(&bytes, label).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Classification failed, rejecting candidate");
                Verdict {
                    accepted: false,
                    raw_text: String::new(),
                }
            },
        };

        if verdict.accepted {
            let final_path = self
                .config
                .output_dir
                .join(format!("{file_key}{}", artifact.extension));
            tokio::fs::rename(&artifact.path, &final_path)
                .await
                .map_err(|e| {
                    WatchshotError::file_io_error("rename artifact to canonical path", &final_path, &e)
                })?;
            Ok(Some(final_path))
        } else {
            if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
                warn!(path = %artifact.path.display(), error = %e, "Failed to delete rejected artifact");
            }
            Ok(None)
        }
    }

    /// Best-effort removal of whatever temp file a failed attempt left behind
    async fn cleanup_temp(&self, file_key: &str, attempt: usize) {
        let stem = self.config.output_dir.join(format!("{file_key}_tmp{attempt}"));
        for ext in VALID_EXTENSIONS {
            let path = append_extension(&stem, ext);
            if path.exists() {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Temp file cleanup failed");
                }
            }
        }
    }
}
