//! Single HTTP GET against the content API with timeouts and a size cap.
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::connectivity::ConnectivityProbe;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Errors that can end a fetch attempt.
///
/// These are returned as data; the coordinator decides what the consumer
/// sees. `Timeout`, `Network` and `ResponseTooLarge` together form the
/// transport-failure family (see [`FetchError::is_transport`]).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The connectivity probe reported no active network; no request was made
    #[error("No network connection available")]
    NetworkUnavailable,
    /// Connect (15s) or read (10s) timeout elapsed
    #[error("Request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, reset)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Any response status other than 200
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size cap
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// The background fetch task panicked
    #[error("Fetch task panicked: {0}")]
    TaskPanicked(String),
}

impl FetchError {
    /// Returns true for DNS/TLS/timeout/reset style failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::Network(_) | FetchError::ResponseTooLarge(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(e)
        }
    }
}

/// Build the HTTP client used for feed requests.
///
/// Connect timeout is 15 seconds and each body read is bounded by 10 seconds.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    build_client_with_timeouts(CONNECT_TIMEOUT, READ_TIMEOUT)
}

pub(crate) fn build_client_with_timeouts(
    connect: Duration,
    read: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .user_agent(concat!("guardian-feed/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Perform one GET against `url` and return the body text.
///
/// # Behavior
///
/// - Returns [`FetchError::NetworkUnavailable`] without any I/O when `probe`
///   reports no network
/// - Only status 200 is accepted; any other status returns
///   [`FetchError::HttpStatus`] without reading the body
/// - No retries
///
/// The response is owned by this function, so the connection is released on
/// every return path.
pub async fn fetch(
    client: &reqwest::Client,
    url: &Url,
    probe: &dyn ConnectivityProbe,
) -> Result<String, FetchError> {
    if !probe.is_online() {
        tracing::info!("No active network, skipping request");
        return Err(FetchError::NetworkUnavailable);
    }

    // The query string carries the API key, so only host and path are logged.
    tracing::debug!(host = url.host_str().unwrap_or(""), path = url.path(), "Fetching feed");

    let response = client.get(url.clone()).send().await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        tracing::warn!(status = status.as_u16(), "Error response code");
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    read_limited_text(response, MAX_RESPONSE_SIZE).await
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                valid_up_to = e.utf8_error().valid_up_to(),
                "Response is not valid UTF-8, replacing bad bytes"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(text)
}
