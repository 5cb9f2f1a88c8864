//! Configuration file parser for ~/.config/guardian-feed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::{FeedConfig, FeedConfigError, ALL_SECTIONS, DEFAULT_ENDPOINT, KNOWN_SECTIONS};
use crate::util::{validate_endpoint, UrlValidationError};

/// Environment variable that overrides `api_key` from the file.
pub const API_KEY_ENV: &str = "GUARDIAN_API_KEY";

/// Public developer key accepted by the content API (rate limited).
const DEVELOPER_API_KEY: &str = "test";

const DEFAULT_PAGE_SIZE: u32 = 10;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed settings: {0}")]
    Feed(#[from] FeedConfigError),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] UrlValidationError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Page size as it appears in the file: either `page_size = 20` or the
/// string-encoded `page_size = "20"` written by settings screens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PageSizeSetting {
    Number(i64),
    Text(String),
}

impl PageSizeSetting {
    fn resolve(&self) -> Result<u32, FeedConfigError> {
        match self {
            PageSizeSetting::Number(n) => FeedConfig::parse_page_size(&n.to_string()),
            PageSizeSetting::Text(s) => FeedConfig::parse_page_size(s),
        }
    }
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// Custom Debug impl masks `api_key` so it never lands in logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Section filter, `"all"` for every section.
    pub section: String,

    /// Free-text search keywords. Empty means no search.
    pub search_keywords: String,

    /// Number of results to request (must be positive).
    pub page_size: PageSizeSetting,

    /// Content API key (alternative to the GUARDIAN_API_KEY env var).
    /// Env var takes precedence over config file.
    pub api_key: Option<String>,

    /// Search endpoint. Overridable for testing against a local server.
    pub endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            section: ALL_SECTIONS.to_string(),
            search_keywords: String::new(),
            page_size: PageSizeSetting::Number(i64::from(DEFAULT_PAGE_SIZE)),
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("section", &self.section)
            .field("search_keywords", &self.search_keywords)
            .field("page_size", &self.page_size)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["section", "search_keywords", "page_size", "api_key", "endpoint"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), section = %config.section, "Loaded configuration");
        Ok(config)
    }

    /// Validate into the snapshot the feed pipeline runs on.
    ///
    /// The API key comes from `GUARDIAN_API_KEY` when set, then the file,
    /// then the public developer key.
    pub fn feed_config(&self) -> Result<FeedConfig, ConfigError> {
        let env_key = std::env::var(API_KEY_ENV).ok();
        self.feed_config_with_key(env_key)
    }

    /// Same as [`Config::feed_config`], with the environment key passed in
    /// instead of read from the process environment.
    pub fn feed_config_with_key(&self, env_key: Option<String>) -> Result<FeedConfig, ConfigError> {
        let endpoint = validate_endpoint(&self.endpoint)?;
        let page_size = self.page_size.resolve()?;
        let api_key = resolve_api_key(env_key, self.api_key.as_deref());

        let section = self.section.trim();
        let section = if section.is_empty() { ALL_SECTIONS } else { section };
        if !KNOWN_SECTIONS.contains(&section) {
            tracing::warn!(section, "Unrecognized section, passing through to the API");
        }

        Ok(FeedConfig::new(endpoint, api_key, page_size)?
            .with_section(section)
            .with_search_keywords(self.search_keywords.as_str()))
    }
}

fn resolve_api_key(env_key: Option<String>, file_key: Option<&str>) -> SecretString {
    let key = env_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            file_key
                .filter(|k| !k.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            tracing::debug!("No API key configured, using developer key");
            DEVELOPER_API_KEY.to_string()
        });
    SecretString::from(key)
}

// ============================================================================
// Tests
// ============================================================================
