//! Request URL construction for the content search endpoint.
//!
//! Everything here is pure: the same [`FeedConfig`] always produces the same
//! URL, and nothing in this module performs I/O or fails.
use secrecy::ExposeSecret;
use url::Url;

use super::types::FeedConfig;

/// Default search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://content.guardianapis.com/search";

/// Section value meaning "no section filter".
pub const ALL_SECTIONS: &str = "all";

/// Section whose default (keyword-less) feed is ranked by relevance.
pub const NEWS_SECTION: &str = "news";

/// Sections offered by the settings collaborator. Other values are passed
/// through to the API unchanged.
pub const KNOWN_SECTIONS: &[&str] = &[
    ALL_SECTIONS,
    NEWS_SECTION,
    "world",
    "uk-news",
    "us-news",
    "politics",
    "business",
    "technology",
    "science",
    "environment",
    "sport",
    "football",
    "culture",
    "film",
    "music",
    "books",
    "lifeandstyle",
    "travel",
    "money",
    "education",
    "commentisfree",
];

/// Boolean operator inserted between search words.
const KEYWORD_JOINER: &str = " AND ";

/// Build the request URL for one fetch.
///
/// Parameter order is fixed so equal configs yield byte-identical URLs:
/// `section`, `order-by`, `q`, `show-fields`, `page-size`, `show-tags`,
/// `api-key`. The first three are conditional.
pub fn build_url(config: &FeedConfig) -> Url {
    let mut url = config.endpoint().clone();
    let keywords = format_keywords(config.search_keywords());

    {
        let mut query = url.query_pairs_mut();

        if config.section() != ALL_SECTIONS {
            query.append_pair("section", config.section());
        }

        if config.section() == NEWS_SECTION && keywords.is_none() {
            query.append_pair("order-by", "relevance");
        }

        if let Some(q) = keywords.as_deref() {
            query.append_pair("q", q);
        }

        query.append_pair("show-fields", "thumbnail");
        query.append_pair("page-size", &config.page_size().to_string());
        query.append_pair("show-tags", "contributor");
        query.append_pair("api-key", config.api_key().expose_secret());
    }

    url
}

/// Normalize free-text keywords into the API's boolean query syntax.
///
/// Whitespace runs collapse to single separators, leading and trailing
/// whitespace is dropped, and `AND` is placed between every pair of words.
/// Blank input yields `None` so no `q` parameter is sent.
///
/// ```
/// use guardian_feed::feed::format_keywords;
///
/// assert_eq!(format_keywords("  climate   change "), Some("climate AND change".to_string()));
/// assert_eq!(format_keywords("   "), None);
/// ```
pub fn format_keywords(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    Some(words.join(KEYWORD_JOINER))
}
