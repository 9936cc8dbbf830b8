//! Candidate image discovery against a web image-search surface
//!
//! Discovery is best-effort scraping of third-party markup and is the most
//! brittle part of the pipeline, so it sits behind the [`CandidateSource`]
//! port: orchestration code and tests never depend on the concrete scraper.
//!
//! Extraction runs layered strategies over the result HTML:
//! 1. `<img>` sources hosted on the trusted thumbnail domain (data URIs are
//!    skipped; they are too small to be useful),
//! 2. if none found, any `<img>` `src`/`data-src` with an absolute http(s)
//!    URL,
//! 3. additionally, inline script payloads carrying `["<url>", w, h]`
//!    triples.
//! Results are merged in that order, deduplicated, and truncated.

use crate::error::{Result, WatchshotError};
use crate::fetch::BROWSER_USER_AGENT;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Image-search endpoint queried per item
const SEARCH_URL: &str = "https://www.google.com/search";

/// Host serving cached search thumbnails, the most reliable downloads
const THUMBNAIL_HOST: &str = "googleusercontent.com";

/// One discovered image URL under consideration for a catalog item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute image URL
    pub url: String,
    /// Discovery order, 0-based
    pub rank: usize,
}

/// Port for candidate image discovery
///
/// # Errors
/// Implementations return [`WatchshotError::Discovery`] for request or parse
/// failures; callers degrade that to an empty candidate list.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Find up to `max_results` unique candidate URLs for `query`
    async fn find(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>>;
}

/// Scrapes an image search results page for candidate URLs
#[derive(Debug, Clone)]
pub struct GoogleImageSearch {
    client: reqwest::Client,
}

impl GoogleImageSearch {
    /// Create a new search client
    ///
    /// # Errors
    /// - Failed to construct the HTTP client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| {
                WatchshotError::discovery(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CandidateSource for GoogleImageSearch {
    async fn find(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        let mut search_url = url::Url::parse(SEARCH_URL)
            .map_err(|e| WatchshotError::discovery(format!("Invalid search URL: {}", e)))?;
        search_url
            .query_pairs_mut()
            .append_pair("q", query)
            .append_pair("tbm", "isch");

        debug!(query = %query, "Requesting image search results");

        let response = self
            .client
            .get(search_url)
            .send()
            .await
            .map_err(|e| WatchshotError::discovery(format!("Search request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| WatchshotError::discovery(format!("Search returned error: {}", e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| WatchshotError::discovery(format!("Failed to read search body: {}", e)))?;

        let urls = extract_candidate_urls(&body, max_results);
        debug!(count = urls.len(), "Extracted candidate URLs");

        Ok(urls
            .into_iter()
            .enumerate()
            .map(|(rank, url)| Candidate { url, rank })
            .collect())
    }
}

fn img_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<img[^>]*>").expect("valid img tag regex"))
}

fn src_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // [^-\w] keeps this from matching inside "data-src"
    RE.get_or_init(|| Regex::new(r#"[^-\w]src\s*=\s*"([^"]*)""#).expect("valid src regex"))
}

fn data_src_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"data-src\s*=\s*"([^"]*)""#).expect("valid data-src regex"))
}

fn script_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("valid script regex"))
}

fn script_triple_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\["(https?://[^"]+\.(?:jpg|jpeg|png|webp|gif)[^"]*)",\d+,\d+\]"#)
            .expect("valid script triple regex")
    })
}

/// Trusted thumbnail sources: `<img src>` on the thumbnail host
fn extract_thumbnail_urls(html: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for tag in img_tag_regex().find_iter(html) {
        let Some(src) = src_attr_regex()
            .captures(tag.as_str())
            .map(|c| c[1].to_string())
        else {
            continue;
        };
        if src.starts_with("data:image") {
            // Inline data URIs are typically tiny placeholders
            continue;
        }
        if src.contains(THUMBNAIL_HOST) {
            urls.push(src);
        }
    }
    urls
}

/// Fallback: any `<img>` src or lazy-load attribute with an absolute URL
fn extract_fallback_urls(html: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for tag in img_tag_regex().find_iter(html) {
        if let Some(src) = src_attr_regex().captures(tag.as_str()) {
            if src[1].starts_with("http") {
                urls.push(src[1].to_string());
            }
        }
        if let Some(data_src) = data_src_attr_regex().captures(tag.as_str()) {
            if data_src[1].starts_with("http") {
                urls.push(data_src[1].to_string());
            }
        }
    }
    urls
}

/// Structured `["<url>", width, height]` literals inside inline scripts
fn extract_script_urls(html: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for script in script_block_regex().captures_iter(html) {
        for triple in script_triple_regex().captures_iter(&script[1]) {
            urls.push(triple[1].to_string());
        }
    }
    urls
}

/// Run all extraction layers, merge, dedupe preserving order, truncate
pub(crate) fn extract_candidate_urls(html: &str, max_results: usize) -> Vec<String> {
    let mut urls = extract_thumbnail_urls(html);
    if urls.is_empty() {
        urls = extract_fallback_urls(html);
    }
    urls.extend(extract_script_urls(html));

    let mut unique = Vec::new();
    for url in urls {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique.truncate(max_results);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_urls_preferred_over_fallback() {
        let html = r#"
            <img src="https://lh3.googleusercontent.com/thumb1">
            <img src="https://example.com/direct.jpg">
        "#;
        let urls = extract_candidate_urls(html, 3);
        assert_eq!(urls, vec!["https://lh3.googleusercontent.com/thumb1"]);
    }

    #[test]
    fn test_data_uris_are_skipped() {
        let html = r#"<img src="data:image/gif;base64,R0lGOD">"#;
        assert!(extract_thumbnail_urls(html).is_empty());
    }

    #[test]
    fn test_fallback_collects_src_and_data_src() {
        let html = r#"
            <img src="https://example.com/a.jpg">
            <img data-src="https://example.com/b.png" src="data:image/gif;base64,x">
            <img src="/relative/skip.jpg">
        "#;
        let urls = extract_fallback_urls(html);
        assert_eq!(
            urls,
            vec!["https://example.com/a.jpg", "https://example.com/b.png"]
        );
    }

    #[test]
    fn test_script_triples_are_extracted() {
        let html = r#"
            <script>var data = [["https://img.example.com/full.jpg?x=1",1200,800]];</script>
        "#;
        let urls = extract_script_urls(html);
        assert_eq!(urls, vec!["https://img.example.com/full.jpg?x=1"]);
    }

    #[test]
    fn test_merge_dedupes_and_truncates() {
        let html = r#"
            <img src="https://lh3.googleusercontent.com/t1">
            <img src="https://lh3.googleusercontent.com/t1">
            <script>[["https://lh3.googleusercontent.com/t1",100,100]]
            [["https://img.example.com/a.jpg",100,100]]
            [["https://img.example.com/b.jpg",100,100]]
            [["https://img.example.com/c.jpg",100,100]]</script>
        "#;
        let urls = extract_candidate_urls(html, 3);
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://lh3.googleusercontent.com/t1");
        assert_eq!(urls[1], "https://img.example.com/a.jpg");
    }

    #[test]
    fn test_empty_page_yields_no_candidates() {
        assert!(extract_candidate_urls("<html><body></body></html>", 3).is_empty());
    }
}
