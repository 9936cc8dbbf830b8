//! Vision-classifier validation of downloaded candidates
//!
//! The classifier is an opaque binary-answer oracle behind the
//! [`ImageClassifier`] port: it receives the raw image bytes plus the catalog
//! item's label and must answer a strict YES/NO rubric. The acceptance rule
//! is deliberately blunt (case-folded response contains `YES`) and any call
//! failure is treated by the caller as a rejection, never retried.

use crate::error::{Result, WatchshotError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Model used for classification
const GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Base endpoint for the Gemini REST API
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// The accept/reject outcome for one downloaded artifact
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the image met every rubric criterion
    pub accepted: bool,
    /// Raw classifier response text, for logging
    pub raw_text: String,
}

impl Verdict {
    /// Interpret raw classifier output: accepted iff the case-folded,
    /// trimmed text contains the literal `YES`
    #[must_use]
    pub fn from_response_text(text: &str) -> Self {
        let normalized = text.trim().to_uppercase();
        Self {
            accepted: normalized.contains("YES"),
            raw_text: text.to_string(),
        }
    }
}

/// Port for external vision classification
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify `image_bytes` against the product-photo rubric for `label`
    ///
    /// # Errors
    /// - Network failures, quota errors, or malformed responses; callers
    ///   treat these as rejections
    async fn classify(&self, image_bytes: &[u8], label: &str) -> Result<Verdict>;
}

/// Gemini-backed classifier
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiClassifier {
    /// Create a classifier using the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn rubric_prompt(label: &str) -> String {
        format!(
            "Please analyze this image and tell me if it contains ONLY a front-facing watch \
             (specifically a {label}) with nothing else in the frame.\n\
             \n\
             Requirements:\n\
             1. The image must show ONLY the watch face from the front\n\
             2. The watch should not be shown from the back\n\
             3. There should not be any other objects, people, or text in the image\n\
             4. The watch should be the clear and central subject\n\
             5. Photo should be high quality and larger than 300x300 pixels\n\
             6. Ensure that the photo is not grainy, blurry or low resolution at all\n\
             \n\
             Answer with ONLY 'YES' if ALL requirements are met, or 'NO' if ANY requirement \
             is not met."
        )
    }
}

#[async_trait]
impl ImageClassifier for GeminiClassifier {
    async fn classify(&self, image_bytes: &[u8], label: &str) -> Result<Verdict> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    RequestPart::Text {
                        text: Self::rubric_prompt(label),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: BASE64.encode(image_bytes),
                        },
                    },
                ],
            }],
        };

        let endpoint = format!("{}/{}:generateContent", GEMINI_API_BASE, GEMINI_MODEL);
        debug!(label = %label, bytes = image_bytes.len(), "Submitting image for classification");

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                WatchshotError::classification(format!("Classifier request failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                WatchshotError::classification(format!("Classifier returned error: {}", e))
            })?;

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            WatchshotError::classification(format!("Malformed classifier response: {}", e))
        })?;

        let text = body.first_text().ok_or_else(|| {
            WatchshotError::classification("Classifier response contained no text")
        })?;

        let verdict = Verdict::from_response_text(&text);
        info!(
            label = %label,
            outcome = if verdict.accepted { "PASSED" } else { "FAILED" },
            "Classifier verdict"
        );
        Ok(verdict)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|part| part.text.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
