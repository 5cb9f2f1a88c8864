//! Endpoint and link validation.
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host would expose the API key.
    #[error("Insecure endpoint: HTTPS required for {0} (HTTP allowed for localhost only)")]
    InsecureEndpoint(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the search endpoint that requests (and the API key) are sent to.
///
/// HTTPS is required, except for loopback hosts so tests can point at a
/// local mock server.
///
/// # Examples
///
/// ```
/// use guardian_feed::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://content.guardianapis.com/search").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080/search").is_ok());
/// assert!(validate_endpoint("http://example.com/search").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback_host(host) => {
            tracing::warn!(endpoint = %host, "Using non-HTTPS endpoint (localhost only)");
        }
        "http" => return Err(UrlValidationError::InsecureEndpoint(host.to_owned())),
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url)
}

/// Validates an article link before handing it to the system opener.
///
/// Only `http`/`https` URLs with a host pass, so a crafted link cannot
/// launch a local file or another URL handler.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !matches!(url.host_str(), Some(host) if !host.is_empty()) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

fn is_loopback_host(host: &str) -> bool {
    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host == "localhost"
        || host_for_parse
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}
