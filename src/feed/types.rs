//! Records produced by the parser and the settings a fetch runs with.
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use super::query::format_keywords;

// ============================================================================
// NewsItem
// ============================================================================

/// A single article from the search API, normalized for display.
///
/// One `NewsItem` exists per (article, contributor) pair, so an article with
/// two contributors produces two items that differ only in `author`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    section: String,
    title: String,
    author: String,
    date: String,
    link: String,
}

impl NewsItem {
    pub fn new(
        section: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        date: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            title: title.into(),
            author: author.into(),
            date: date.into(),
            link: link.into(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Headline with the trailing byline removed.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Two-line display string (`"May 1 2023\n2:30 PM"`), empty when the
    /// publication timestamp could not be parsed.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// First line of [`date`](Self::date), e.g. `"May 1 2023"`.
    pub fn date_line(&self) -> &str {
        self.date.split('\n').next().unwrap_or("")
    }

    /// Second line of [`date`](Self::date), e.g. `"2:30 PM"`.
    pub fn time_line(&self) -> &str {
        self.date.split('\n').nth(1).unwrap_or("")
    }

    pub fn link(&self) -> &str {
        &self.link
    }
}

// ============================================================================
// FeedConfig
// ============================================================================

#[derive(Debug, Error)]
pub enum FeedConfigError {
    #[error("Page size must be a positive integer, got {0:?}")]
    InvalidPageSize(String),
}

/// Snapshot of the user-facing filters that drive one fetch.
///
/// The API key is held as a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    endpoint: Url,
    api_key: SecretString,
    section: String,
    search_keywords: String,
    page_size: u32,
}

impl FeedConfig {
    /// Create a config for the `"all"` section with no search keywords.
    ///
    /// Fails when `page_size` is zero.
    pub fn new(endpoint: Url, api_key: SecretString, page_size: u32) -> Result<Self, FeedConfigError> {
        if page_size == 0 {
            return Err(FeedConfigError::InvalidPageSize(page_size.to_string()));
        }
        Ok(Self {
            endpoint,
            api_key,
            section: super::query::ALL_SECTIONS.to_string(),
            search_keywords: String::new(),
            page_size,
        })
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn with_search_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.search_keywords = keywords.into();
        self
    }

    /// Parse a string-encoded page size as supplied by settings collaborators.
    pub fn parse_page_size(raw: &str) -> Result<u32, FeedConfigError> {
        match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(FeedConfigError::InvalidPageSize(raw.to_string())),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Keywords exactly as the user typed them.
    pub fn search_keywords(&self) -> &str {
        &self.search_keywords
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether switching from `self` to `other` changes the result set.
    ///
    /// Only section, normalized keywords, and page size count; an API key or
    /// endpoint change alone does not trigger a refetch.
    pub fn requires_refresh(&self, other: &FeedConfig) -> bool {
        self.section != other.section
            || self.page_size != other.page_size
            || format_keywords(&self.search_keywords) != format_keywords(&other.search_keywords)
    }
}
