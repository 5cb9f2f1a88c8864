//! Refresh lifecycle for a single feed.
//!
//! The coordinator lives on the consumer's side. [`FeedCoordinator::start`]
//! spawns the fetch and parse on a tokio task and returns at once; the task
//! reports back over an mpsc channel with a [`FetchCompletion`] tagged by the
//! generation that spawned it. The consumer passes each completion to
//! [`FeedCoordinator::complete`], which only accepts the current generation.
//!
//! ```text
//!  start(cfg) ──► generation += 1 ──► tokio::spawn(fetch + parse)
//!                                            │
//!  complete(c) ◄── rx.recv() ◄── FetchCompletion { generation, result }
//!      │
//!      └─ generation mismatch → dropped
//! ```
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::connectivity::ConnectivityProbe;
use super::fetcher::{fetch, FetchError};
use super::parser::parse_news;
use super::query::build_url;
use super::types::{FeedConfig, NewsItem};
use crate::util::catch_task_panic;

/// Capacity of the completion channel. At most one task is live per
/// coordinator, so a small buffer is enough to absorb a superseded send.
const COMPLETION_CHANNEL_CAPACITY: usize = 8;

/// Where the coordinator is in its refresh cycle.
#[derive(Debug)]
pub enum FeedState {
    Idle,
    Loading,
    /// Fetch succeeded. The list may be empty; presenting an empty state is
    /// up to the consumer.
    Delivered(Vec<NewsItem>),
    Failed(FetchError),
}

/// Outcome of one fetch attempt, sent from the worker task to the consumer.
#[derive(Debug)]
pub struct FetchCompletion {
    generation: u64,
    result: Result<Vec<NewsItem>, FetchError>,
}

impl FetchCompletion {
    /// Generation of the `start` call that produced this completion.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct FeedCoordinator {
    client: reqwest::Client,
    probe: Arc<dyn ConnectivityProbe>,
    completion_tx: mpsc::Sender<FetchCompletion>,
    state: FeedState,

    /// Incremented by every `start` and `reset`. A completion is accepted
    /// only when its generation matches, so a fetch that lands after being
    /// superseded can never overwrite a newer request's outcome.
    generation: u64,

    /// Handle to the in-flight fetch task, aborted when superseded.
    fetch_handle: Option<JoinHandle<()>>,
}

impl FeedCoordinator {
    /// Create an idle coordinator and the receiver its completions arrive on.
    pub fn new(
        client: reqwest::Client,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> (Self, mpsc::Receiver<FetchCompletion>) {
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);
        let coordinator = Self {
            client,
            probe,
            completion_tx,
            state: FeedState::Idle,
            generation: 0,
            fetch_handle: None,
        };
        (coordinator, completion_rx)
    }

    /// Begin a fetch for `config`, superseding any fetch still in flight.
    ///
    /// Returns the generation assigned to the new fetch. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, config: &FeedConfig) -> u64 {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            if matches!(self.state, FeedState::Loading) {
                tracing::debug!(generation = self.generation, "Superseded in-flight fetch");
            }
        }

        self.generation += 1;
        let generation = self.generation;

        tracing::debug!(
            generation,
            section = config.section(),
            page_size = config.page_size(),
            "Starting feed fetch"
        );

        self.state = FeedState::Loading;
        self.fetch_handle = Some(spawn_fetch(
            generation,
            build_url(config),
            self.client.clone(),
            Arc::clone(&self.probe),
            self.completion_tx.clone(),
        ));

        generation
    }

    /// Apply a completion received from the channel.
    ///
    /// Returns the new state when the completion was accepted, or `None`
    /// when it belonged to a superseded or reset fetch.
    pub fn complete(&mut self, completion: FetchCompletion) -> Option<&FeedState> {
        if completion.generation != self.generation {
            tracing::debug!(
                expected = self.generation,
                got = completion.generation,
                "Ignoring stale fetch result (generation mismatch)"
            );
            return None;
        }

        if !matches!(self.state, FeedState::Loading) {
            tracing::debug!(generation = completion.generation, "Ignoring fetch result, not loading");
            return None;
        }

        self.fetch_handle = None;
        self.state = match completion.result {
            Ok(items) => {
                tracing::info!(generation = completion.generation, count = items.len(), "Feed delivered");
                FeedState::Delivered(items)
            }
            Err(error) => {
                tracing::warn!(generation = completion.generation, error = %error, "Feed fetch failed");
                FeedState::Failed(error)
            }
        };

        Some(&self.state)
    }

    /// Return to `Idle` and drop any buffered records.
    ///
    /// An in-flight fetch is aborted, and its result is discarded if it
    /// still arrives.
    pub fn reset(&mut self) {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            tracing::debug!(generation = self.generation, "Aborted fetch task on reset");
        }
        self.generation += 1;
        self.state = FeedState::Idle;
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, FeedState::Loading)
    }

    /// Records from the last delivered fetch, empty in every other state.
    pub fn items(&self) -> &[NewsItem] {
        match &self.state {
            FeedState::Delivered(items) => items,
            _ => &[],
        }
    }
}

impl Drop for FeedCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
            tracing::debug!("Aborted fetch task on coordinator drop");
        }
    }
}

/// Spawn the fetch-and-parse task for one generation.
///
/// A panic inside the task is reported as [`FetchError::TaskPanicked`] so
/// the coordinator never stays in `Loading`.
fn spawn_fetch(
    generation: u64,
    url: Url,
    client: reqwest::Client,
    probe: Arc<dyn ConnectivityProbe>,
    tx: mpsc::Sender<FetchCompletion>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match catch_task_panic(fetch_and_parse(&client, &url, probe.as_ref())).await {
            Ok(result) => result,
            Err(panic_msg) => {
                tracing::error!(task = "feed_fetch", generation, error = %panic_msg, "Background task panicked");
                Err(FetchError::TaskPanicked(panic_msg))
            }
        };

        if let Err(e) = tx.send(FetchCompletion { generation, result }).await {
            tracing::warn!(error = %e, event = "FetchCompletion", "Channel send failed (receiver dropped)");
        }
    })
}

async fn fetch_and_parse(
    client: &reqwest::Client,
    url: &Url,
    probe: &dyn ConnectivityProbe,
) -> Result<Vec<NewsItem>, FetchError> {
    let body = fetch(client, url, probe).await?;
    Ok(parse_news(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ONE_ITEM: &str = r#"{"response":{"results":[{
        "webTitle":"Headline | Byline",
        "sectionName":"World news",
        "webPublicationDate":"2023-05-01T14:30:00Z",
        "webUrl":"https://www.theguardian.com/world/1",
        "tags":[{"webTitle":"Reporter"}]
    }]}}"#;

    fn offline_coordinator() -> (FeedCoordinator, mpsc::Receiver<FetchCompletion>) {
        FeedCoordinator::new(reqwest::Client::new(), Arc::new(|| false))
    }

    fn online_coordinator() -> (FeedCoordinator, mpsc::Receiver<FetchCompletion>) {
        FeedCoordinator::new(reqwest::Client::new(), Arc::new(|| true))
    }

    fn config_for(endpoint: &str) -> FeedConfig {
        FeedConfig::new(
            Url::parse(endpoint).unwrap(),
            SecretString::from("test".to_string()),
            10,
        )
        .unwrap()
    }

    /// Feed completions into the coordinator until one is accepted.
    async fn next_accepted(
        coordinator: &mut FeedCoordinator,
        rx: &mut mpsc::Receiver<FetchCompletion>,
    ) -> u64 {
        loop {
            let completion = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for completion")
                .expect("channel closed");
            let generation = completion.generation();
            if coordinator.complete(completion).is_some() {
                return generation;
            }
        }
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let (coordinator, _rx) = offline_coordinator();
        assert!(matches!(coordinator.state(), FeedState::Idle));
        assert_eq!(coordinator.generation(), 0);
        assert!(coordinator.items().is_empty());
    }

    #[tokio::test]
    async fn test_start_transitions_to_loading() {
        let (mut coordinator, _rx) = offline_coordinator();
        let generation = coordinator.start(&config_for("https://content.guardianapis.com/search"));
        assert_eq!(generation, 1);
        assert!(coordinator.is_loading());
    }

    #[tokio::test]
    async fn test_offline_delivers_network_unavailable() {
        let (mut coordinator, mut rx) = offline_coordinator();
        coordinator.start(&config_for("https://content.guardianapis.com/search"));

        next_accepted(&mut coordinator, &mut rx).await;
        assert!(matches!(
            coordinator.state(),
            FeedState::Failed(FetchError::NetworkUnavailable)
        ));
        assert!(coordinator.items().is_empty());
    }

    #[tokio::test]
    async fn test_stale_completion_discarded() {
        let (mut coordinator, _rx) = offline_coordinator();
        let config = config_for("https://content.guardianapis.com/search");
        coordinator.start(&config);
        coordinator.start(&config.clone().with_section("world"));

        let stale = FetchCompletion {
            generation: 1,
            result: Ok(vec![NewsItem::new("s", "stale", "a", "", "l")]),
        };
        assert!(coordinator.complete(stale).is_none());
        assert!(coordinator.is_loading());

        let current = FetchCompletion {
            generation: 2,
            result: Ok(vec![NewsItem::new("s", "fresh", "a", "", "l")]),
        };
        assert!(matches!(coordinator.complete(current), Some(FeedState::Delivered(_))));
        assert_eq!(coordinator.items()[0].title(), "fresh");
    }

    #[tokio::test]
    async fn test_duplicate_completion_ignored_after_delivery() {
        let (mut coordinator, _rx) = offline_coordinator();
        coordinator.start(&config_for("https://content.guardianapis.com/search"));

        let first = FetchCompletion { generation: 1, result: Ok(Vec::new()) };
        assert!(coordinator.complete(first).is_some());

        let again = FetchCompletion {
            generation: 1,
            result: Err(FetchError::HttpStatus(500)),
        };
        assert!(coordinator.complete(again).is_none());
        assert!(matches!(coordinator.state(), FeedState::Delivered(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_items_and_discards_late_result() {
        let (mut coordinator, _rx) = offline_coordinator();
        coordinator.start(&config_for("https://content.guardianapis.com/search"));
        coordinator.complete(FetchCompletion {
            generation: 1,
            result: Ok(vec![NewsItem::new("s", "t", "a", "", "l")]),
        });
        assert_eq!(coordinator.items().len(), 1);

        coordinator.start(&config_for("https://content.guardianapis.com/search"));
        coordinator.reset();
        assert!(matches!(coordinator.state(), FeedState::Idle));
        assert!(coordinator.items().is_empty());

        let late = FetchCompletion { generation: 2, result: Ok(Vec::new()) };
        assert!(coordinator.complete(late).is_none());
        assert!(matches!(coordinator.state(), FeedState::Idle));
    }

    #[tokio::test]
    async fn test_delivers_parsed_items() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_ITEM))
            .mount(&mock_server)
            .await;

        let (mut coordinator, mut rx) = online_coordinator();
        coordinator.start(&config_for(&format!("{}/search", mock_server.uri())));

        next_accepted(&mut coordinator, &mut rx).await;
        let items = coordinator.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title(), "Headline");
        assert_eq!(items[0].author(), "Reporter");
        assert_eq!(items[0].date_line(), "May 1 2023");
        assert_eq!(items[0].time_line(), "2:30 PM");
    }

    #[tokio::test]
    async fn test_http_error_delivered_as_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let (mut coordinator, mut rx) = online_coordinator();
        coordinator.start(&config_for(&format!("{}/search", mock_server.uri())));

        next_accepted(&mut coordinator, &mut rx).await;
        assert!(matches!(
            coordinator.state(),
            FeedState::Failed(FetchError::HttpStatus(404))
        ));
        assert!(coordinator.items().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_delivers_empty_list() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let (mut coordinator, mut rx) = online_coordinator();
        coordinator.start(&config_for(&format!("{}/search", mock_server.uri())));

        next_accepted(&mut coordinator, &mut rx).await;
        match coordinator.state() {
            FeedState::Delivered(items) => assert!(items.is_empty()),
            other => panic!("Expected empty delivery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_superseded_fetch_never_delivered() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("section", "world"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(ONE_ITEM)
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("section", "sport"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response":{"results":[]}}"#))
            .mount(&mock_server)
            .await;

        let (mut coordinator, mut rx) = online_coordinator();
        let base = config_for(&format!("{}/search", mock_server.uri()));
        let first = coordinator.start(&base.clone().with_section("world"));
        let second = coordinator.start(&base.with_section("sport"));
        assert_eq!(second, first + 1);

        let accepted = next_accepted(&mut coordinator, &mut rx).await;
        assert_eq!(accepted, second);
        match coordinator.state() {
            FeedState::Delivered(items) => assert!(items.is_empty()),
            other => panic!("Expected sport delivery, got {:?}", other),
        }

        // Give the superseded request time to land; it must not change state.
        tokio::time::sleep(Duration::from_millis(400)).await;
        while let Ok(late) = rx.try_recv() {
            assert!(coordinator.complete(late).is_none());
        }
        assert!(coordinator.items().is_empty());
    }
}
