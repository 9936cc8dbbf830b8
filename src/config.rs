//! Environment-backed settings for both pipeline stages
//!
//! API keys are resolved from a `.env` file when one exists, falling back to
//! the bare process environment: a project-root `.env` wins over a local one.
//! A key that is unset, empty, or still the documented placeholder counts as
//! absent, and absence is a fatal configuration error at stage startup.

use crate::error::{Result, WatchshotError};
use std::path::{Path, PathBuf};

/// Environment variable holding the vision-classifier API key
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Environment variable holding the background-removal API key
pub const REMOVE_BG_API_KEY_VAR: &str = "REMOVE_BG_API_KEY";

/// Placeholder values shipped in example configs, treated as unset
const PLACEHOLDER_KEYS: &[&str] = &["YOUR_GEMINI_API_KEY", "YOUR_REMOVE_BG_API_KEY"];

/// Default directory for accepted canonical images
pub const DEFAULT_OUTPUT_DIR: &str = "garmin_watch_images";
/// Default directory for matted (background-removed) outputs
pub const DEFAULT_MATTE_DIR: &str = "garmin_watch_images_nobg";

/// Resolved runtime settings shared by the binaries
#[derive(Debug, Clone)]
pub struct Settings {
    /// Vision-classifier API key, if a usable one was found
    pub gemini_api_key: Option<String>,
    /// Background-removal API key, if a usable one was found
    pub remove_bg_api_key: Option<String>,
    /// Directory holding accepted canonical images
    pub output_dir: PathBuf,
    /// Directory receiving matted outputs
    pub matte_dir: PathBuf,
}

impl Settings {
    /// Load settings, resolving `.env` files before reading the environment
    ///
    /// Search order: `<project root>/.env`, then `./.env`, then the bare
    /// environment. The first file found is loaded; existing process
    /// environment variables always take precedence over file entries.
    #[must_use]
    pub fn load() -> Self {
        load_dotenv();

        Self {
            gemini_api_key: usable_key(GEMINI_API_KEY_VAR),
            remove_bg_api_key: usable_key(REMOVE_BG_API_KEY_VAR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            matte_dir: PathBuf::from(DEFAULT_MATTE_DIR),
        }
    }

    /// Vision-classifier key, or a fatal configuration error
    ///
    /// # Errors
    /// - Key absent, empty, or a placeholder value
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().ok_or_else(|| {
            WatchshotError::configuration(format!(
                "{} not set. Provide it via the environment or a .env file.",
                GEMINI_API_KEY_VAR
            ))
        })
    }

    /// Background-removal key, or a fatal configuration error
    ///
    /// # Errors
    /// - Key absent, empty, or a placeholder value
    pub fn require_remove_bg_key(&self) -> Result<&str> {
        self.remove_bg_api_key.as_deref().ok_or_else(|| {
            WatchshotError::configuration(format!(
                "{} not set. Provide it via the environment or a .env file.",
                REMOVE_BG_API_KEY_VAR
            ))
        })
    }
}

/// Load the first `.env` file found in the fallback search order
fn load_dotenv() {
    let root_env = Path::new("../../.env");
    let local_env = Path::new(".env");

    if root_env.exists() {
        let _ = dotenvy::from_path(root_env);
    } else if local_env.exists() {
        let _ = dotenvy::from_path(local_env);
    } else {
        let _ = dotenvy::dotenv();
    }
}

/// Read an environment variable, rejecting empty and placeholder values
fn usable_key(var: &str) -> Option<String> {
    let value = std::env::var(var).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() || PLACEHOLDER_KEYS.contains(&trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_keys_are_rejected() {
        std::env::set_var("WATCHSHOT_TEST_PLACEHOLDER", "YOUR_GEMINI_API_KEY");
        assert!(usable_key("WATCHSHOT_TEST_PLACEHOLDER").is_none());
        std::env::remove_var("WATCHSHOT_TEST_PLACEHOLDER");
    }

    #[test]
    fn test_empty_key_is_rejected() {
        std::env::set_var("WATCHSHOT_TEST_EMPTY", "   ");
        assert!(usable_key("WATCHSHOT_TEST_EMPTY").is_none());
        std::env::remove_var("WATCHSHOT_TEST_EMPTY");
    }

    #[test]
    fn test_real_key_is_accepted() {
        std::env::set_var("WATCHSHOT_TEST_REAL", "sk-test-1234");
        assert_eq!(
            usable_key("WATCHSHOT_TEST_REAL").as_deref(),
            Some("sk-test-1234")
        );
        std::env::remove_var("WATCHSHOT_TEST_REAL");
    }

    #[test]
    fn test_missing_key_yields_configuration_error() {
        let settings = Settings {
            gemini_api_key: None,
            remove_bg_api_key: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            matte_dir: PathBuf::from(DEFAULT_MATTE_DIR),
        };
        assert!(matches!(
            settings.require_gemini_key(),
            Err(WatchshotError::Configuration(_))
        ));
        assert!(matches!(
            settings.require_remove_bg_key(),
            Err(WatchshotError::Configuration(_))
        ));
    }
}
