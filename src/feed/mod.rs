//! News feed retrieval: query construction, fetching, parsing, and refresh.
//!
//! - [`query`] - Pure `FeedConfig` → request URL construction
//! - [`fetcher`] - One HTTP GET with timeouts and a connectivity precheck
//! - [`parser`] - Tolerant JSON decoding into [`NewsItem`]s
//! - [`coordinator`] - Refresh lifecycle with supersession of stale fetches
//!
//! # Example
//!
//! ```ignore
//! use guardian_feed::feed::{build_client, FeedCoordinator, FeedState, RouteProbe};
//!
//! let (mut coordinator, mut rx) =
//!     FeedCoordinator::new(build_client()?, Arc::new(RouteProbe::default()));
//! coordinator.start(&config);
//!
//! while let Some(completion) = rx.recv().await {
//!     if let Some(FeedState::Delivered(items)) = coordinator.complete(completion) {
//!         render(items);
//!     }
//! }
//! ```

mod connectivity;
mod coordinator;
mod fetcher;
mod parser;
mod query;
mod types;

pub use connectivity::{ConnectivityProbe, RouteProbe};
pub use coordinator::{FeedCoordinator, FeedState, FetchCompletion};
pub use fetcher::{build_client, fetch, FetchError};
pub use parser::{parse_news, parse_response, ParseError, ParseOutcome};
pub use query::{
    build_url, format_keywords, ALL_SECTIONS, DEFAULT_ENDPOINT, KNOWN_SECTIONS, NEWS_SECTION,
};
pub use types::{FeedConfig, FeedConfigError, NewsItem};

use crate::util::{validate_url_for_open, UrlValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Refusing to open link: {0}")]
    InvalidLink(#[from] UrlValidationError),
    #[error("Failed to launch browser: {0}")]
    Launch(#[from] std::io::Error),
}

/// Open an item's link in the system's default browser.
///
/// The link is validated first; only http/https URLs are handed to the OS.
pub fn open_item(item: &NewsItem) -> Result<(), OpenError> {
    let url = validate_url_for_open(item.link())?;
    tracing::debug!(link = %url, "Opening article in browser");
    open::that(url.as_str())?;
    Ok(())
}
