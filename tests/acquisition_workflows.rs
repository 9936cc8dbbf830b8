//! Acquisition state-machine tests driven through deterministic fake ports
//!
//! Each fake records its calls so tests can assert not only the terminal
//! status but also which external capabilities were (not) touched.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use watchshot::{
    append_extension, infer_extension, AcquisitionConfig, AcquisitionController,
    AcquisitionStatus, Artifact, Candidate, CandidateFetcher, CandidateSource, CatalogItem,
    ImageClassifier, Result, Verdict, WatchshotError,
};

fn fenix7() -> CatalogItem {
    CatalogItem {
        series: "Fenix",
        product: "Fenix",
        model: Some("7"),
    }
}

fn zero_delay_config(output_dir: &Path) -> AcquisitionConfig {
    AcquisitionConfig {
        output_dir: output_dir.to_path_buf(),
        max_candidates: 3,
        candidate_delay: Duration::ZERO,
        item_delay: Duration::ZERO,
    }
}

/// Candidate source backed by a fixed URL list
struct FakeSource {
    candidates: Vec<String>,
    fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    fn new(candidates: &[&str]) -> Self {
        Self {
            candidates: candidates.iter().map(ToString::to_string).collect(),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing() -> Self {
        let mut source = Self::new(&[]);
        source.fail = true;
        source
    }
}

#[async_trait]
impl CandidateSource for FakeSource {
    async fn find(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(WatchshotError::discovery("search unavailable"));
        }
        Ok(self
            .candidates
            .iter()
            .take(max_results)
            .enumerate()
            .map(|(rank, url)| Candidate {
                url: url.clone(),
                rank,
            })
            .collect())
    }
}

/// Fetcher that writes the source URL as the file payload
///
/// The payload lets the fake classifier key its verdict off the candidate
/// that produced the bytes.
struct FakeFetcher {
    fail_urls: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            fail_urls: HashSet::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing_for(urls: &[&str]) -> Self {
        let mut fetcher = Self::new();
        fetcher.fail_urls = urls.iter().map(ToString::to_string).collect();
        fetcher
    }
}

#[async_trait]
impl CandidateFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest_stem: &Path) -> Result<Artifact> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail_urls.contains(url) {
            return Err(WatchshotError::transfer("connection refused"));
        }
        let extension = infer_extension(url);
        let dest = append_extension(dest_stem, &extension);
        tokio::fs::write(&dest, url.as_bytes()).await?;
        Ok(Artifact {
            path: dest,
            extension,
            source_url: url.to_string(),
        })
    }
}

/// Classifier accepting only a configured payload
struct FakeClassifier {
    accept_payload: Option<String>,
    fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeClassifier {
    fn accepting(payload: &str) -> Self {
        Self {
            accept_payload: Some(payload.to_string()),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn rejecting_all() -> Self {
        Self {
            accept_payload: None,
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing() -> Self {
        let mut classifier = Self::rejecting_all();
        classifier.fail = true;
        classifier
    }
}

#[async_trait]
impl ImageClassifier for FakeClassifier {
    async fn classify(&self, image_bytes: &[u8], label: &str) -> Result<Verdict> {
        self.calls.lock().unwrap().push(label.to_string());
        if self.fail {
            return Err(WatchshotError::classification("quota exceeded"));
        }
        let accepted = self
            .accept_payload
            .as_deref()
            .is_some_and(|payload| payload.as_bytes() == image_bytes);
        Ok(Verdict {
            accepted,
            raw_text: if accepted { "YES".into() } else { "NO".into() },
        })
    }
}

fn dir_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn existing_file_skips_without_any_port_calls() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Fenix_Fenix_7.png"), b"").unwrap();

    let source = FakeSource::new(&["https://img.example.com/a.jpg"]);
    let fetcher = FakeFetcher::new();
    let classifier = FakeClassifier::rejecting_all();
    let (source_calls, fetch_calls, classify_calls) = (
        Arc::clone(&source.calls),
        Arc::clone(&fetcher.calls),
        Arc::clone(&classifier.calls),
    );

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(fetcher),
        Box::new(classifier),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Skipped);
    assert_eq!(
        result.final_path.unwrap(),
        dir.path().join("Fenix_Fenix_7.png")
    );
    assert!(source_calls.lock().unwrap().is_empty());
    assert!(fetch_calls.lock().unwrap().is_empty());
    assert!(classify_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn first_download_fails_second_candidate_accepted() {
    let dir = tempfile::tempdir().unwrap();

    let first = "https://img.example.com/bad.jpg";
    let second = "https://img.example.com/good.jpg";
    let source = FakeSource::new(&[first, second]);
    let fetcher = FakeFetcher::failing_for(&[first]);
    let classifier = FakeClassifier::accepting(second);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(fetcher),
        Box::new(classifier),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Success);
    assert_eq!(
        result.final_path.unwrap(),
        dir.path().join("Fenix_Fenix_7.jpg")
    );

    // Exactly the canonical file, no temp residue
    assert_eq!(dir_file_names(dir.path()), vec!["Fenix_Fenix_7.jpg"]);
}

#[tokio::test]
async fn accepted_candidate_preserves_resolved_extension() {
    let dir = tempfile::tempdir().unwrap();

    let url = "https://img.example.com/photo.png";
    let source = FakeSource::new(&[url]);
    let classifier = FakeClassifier::accepting(url);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(FakeFetcher::new()),
        Box::new(classifier),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Success);
    assert_eq!(dir_file_names(dir.path()), vec!["Fenix_Fenix_7.png"]);
}

#[tokio::test]
async fn all_candidates_rejected_fails_with_clean_directory() {
    let dir = tempfile::tempdir().unwrap();

    let source = FakeSource::new(&[
        "https://img.example.com/a.jpg",
        "https://img.example.com/b.jpg",
        "https://img.example.com/c.jpg",
    ]);
    let fetcher = FakeFetcher::new();
    let classifier = FakeClassifier::rejecting_all();
    let classify_calls = Arc::clone(&classifier.calls);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(fetcher),
        Box::new(classifier),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert!(result.final_path.is_none());
    assert_eq!(classify_calls.lock().unwrap().len(), 3);
    assert!(dir_file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn search_failure_degrades_to_failed_without_downloads() {
    let dir = tempfile::tempdir().unwrap();

    let fetcher = FakeFetcher::new();
    let fetch_calls = Arc::clone(&fetcher.calls);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(FakeSource::failing()),
        Box::new(fetcher),
        Box::new(FakeClassifier::rejecting_all()),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert!(fetch_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn classifier_error_counts_as_rejection() {
    let dir = tempfile::tempdir().unwrap();

    let source = FakeSource::new(&["https://img.example.com/a.jpg"]);
    let classifier = FakeClassifier::failing();

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(FakeFetcher::new()),
        Box::new(classifier),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert!(dir_file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn classifier_receives_item_label() {
    let dir = tempfile::tempdir().unwrap();

    let url = "https://img.example.com/a.jpg";
    let source = FakeSource::new(&[url]);
    let classifier = FakeClassifier::accepting(url);
    let classify_calls = Arc::clone(&classifier.calls);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(FakeFetcher::new()),
        Box::new(classifier),
    );

    controller.acquire_item(&fenix7()).await;
    assert_eq!(
        classify_calls.lock().unwrap().as_slice(),
        ["Garmin Fenix 7"]
    );
}

#[tokio::test]
async fn run_emits_results_in_catalog_order() {
    let dir = tempfile::tempdir().unwrap();

    let url = "https://img.example.com/a.jpg";
    let source = FakeSource::new(&[url]);
    let source_calls = Arc::clone(&source.calls);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(FakeFetcher::new()),
        Box::new(FakeClassifier::accepting(url)),
    );

    let catalog = vec![
        fenix7(),
        CatalogItem {
            series: "Venu",
            product: "Venu",
            model: None,
        },
    ];
    let summary = controller.run(&catalog).await.unwrap();

    let keys: Vec<&str> = summary.results.iter().map(|r| r.file_key.as_str()).collect();
    assert_eq!(keys, ["Fenix_Fenix_7", "Venu_Venu"]);
    assert_eq!(summary.successes(), 2);
    assert_eq!(summary.failures(), 0);
    assert_eq!(source_calls.lock().unwrap().len(), 2);
    assert_eq!(
        dir_file_names(dir.path()),
        vec!["Fenix_Fenix_7.jpg", "Venu_Venu.jpg"]
    );
}

#[tokio::test]
async fn at_most_three_candidates_are_attempted() {
    let dir = tempfile::tempdir().unwrap();

    let source = FakeSource::new(&[
        "https://img.example.com/a.jpg",
        "https://img.example.com/b.jpg",
        "https://img.example.com/c.jpg",
        "https://img.example.com/d.jpg",
    ]);
    let fetcher = FakeFetcher::failing_for(&[
        "https://img.example.com/a.jpg",
        "https://img.example.com/b.jpg",
        "https://img.example.com/c.jpg",
        "https://img.example.com/d.jpg",
    ]);
    let fetch_calls = Arc::clone(&fetcher.calls);

    let controller = AcquisitionController::new(
        zero_delay_config(dir.path()),
        Box::new(source),
        Box::new(fetcher),
        Box::new(FakeClassifier::rejecting_all()),
    );

    let result = controller.acquire_item(&fenix7()).await;
    assert_eq!(result.status, AcquisitionStatus::Failed);
    assert_eq!(fetch_calls.lock().unwrap().len(), 3);
}
