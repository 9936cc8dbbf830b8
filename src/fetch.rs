//! Candidate image download with browser-like headers and streamed writes
//!
//! Downloads are streamed to a temporary path owned by a single candidate
//! attempt. On any failure the partial file is removed before the error is
//! returned, so a failed fetch never leaves an artifact behind.

use crate::error::{Result, WatchshotError};
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Browser user agent sent on search and download requests
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Extensions accepted for canonical image files
pub const VALID_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// Fallback extension when the URL path does not carry a whitelisted one
const DEFAULT_EXTENSION: &str = ".jpg";

/// Download timeout per candidate
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum redirects followed per download
const MAX_REDIRECTS: usize = 5;

/// A downloaded candidate file, alive for the duration of one attempt
///
/// The owning attempt must either rename the file to its canonical path or
/// delete it before moving on.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Where the bytes were written (temp stem plus resolved extension)
    pub path: PathBuf,
    /// Resolved extension including the leading dot
    pub extension: String,
    /// URL the bytes came from
    pub source_url: String,
}

/// Port for downloading one candidate URL to a temporary artifact
#[async_trait]
pub trait CandidateFetcher: Send + Sync {
    /// Download `url` to `dest_stem` plus an inferred extension
    ///
    /// # Errors
    /// - Network, timeout, or write failures; the candidate produced no
    ///   artifact and the caller moves on to the next one
    async fn fetch(&self, url: &str, dest_stem: &Path) -> Result<Artifact>;
}

/// Downloads candidate URLs to disk
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    /// Create a fetcher with the browser-spoofing header set
    ///
    /// Image hosts commonly reject requests without a plausible browser
    /// fingerprint, so every request carries a Referer of the search surface
    /// and image-accepting fetch metadata headers.
    ///
    /// # Errors
    /// - Failed to construct the HTTP client
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("image"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("no-cors"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("cross-site"));

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(FETCH_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| WatchshotError::transfer(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn write_body(&self, response: reqwest::Response, dest: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| WatchshotError::file_io_error("create download file", dest, &e))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| WatchshotError::transfer(format!("Download stream failed: {}", e)))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| WatchshotError::file_io_error("write download chunk", dest, &e))?;
        }

        file.flush()
            .await
            .map_err(|e| WatchshotError::file_io_error("flush download file", dest, &e))?;
        Ok(())
    }
}

#[async_trait]
impl CandidateFetcher for ImageFetcher {
    /// Download with the browser header set, streaming the body to disk
    ///
    /// The partial file is removed before a write-stream error is returned.
    async fn fetch(&self, url: &str, dest_stem: &Path) -> Result<Artifact> {
        let extension = infer_extension(url);
        let dest = append_extension(dest_stem, &extension);

        debug!(url = %url, dest = %dest.display(), "Downloading candidate");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WatchshotError::transfer_for_url("download image", url, &e))?
            .error_for_status()
            .map_err(|e| WatchshotError::transfer_for_url("download image", url, &e))?;

        match self.write_body(response, &dest).await {
            Ok(()) => {
                info!(dest = %dest.display(), "Downloaded image");
                Ok(Artifact {
                    path: dest,
                    extension,
                    source_url: url.to_string(),
                })
            },
            Err(e) => {
                if let Err(cleanup_err) = tokio::fs::remove_file(&dest).await {
                    debug!(error = %cleanup_err, "Partial download cleanup failed");
                }
                Err(e)
            },
        }
    }
}

/// Infer the output extension from a candidate URL's path suffix
///
/// Non-whitelisted suffixes and unparsable URLs fall back to `.jpg`.
#[must_use]
pub fn infer_extension(candidate_url: &str) -> String {
    let Ok(parsed) = url::Url::parse(candidate_url) else {
        return DEFAULT_EXTENSION.to_string();
    };
    let path = parsed.path().to_lowercase();
    VALID_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(*ext))
        .map_or_else(|| DEFAULT_EXTENSION.to_string(), ToString::to_string)
}

/// Append `extension` (which includes the leading dot) to a path stem
#[must_use]
pub fn append_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut s = stem.as_os_str().to_os_string();
    s.push(extension);
    PathBuf::from(s)
}
