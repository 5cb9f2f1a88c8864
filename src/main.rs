use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use guardian_feed::config::{Config, PageSizeSetting};
use guardian_feed::feed::{
    build_client, open_item, FeedConfig, FeedCoordinator, FeedState, FetchCompletion, FetchError,
    NewsItem, RouteProbe,
};

/// Get the config directory path (~/.config/guardian-feed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("guardian-feed"))
}

#[derive(Parser, Debug)]
#[command(name = "guardian-feed", about = "Latest Guardian headlines in your terminal")]
struct Args {
    /// Config file (defaults to ~/.config/guardian-feed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Section filter, e.g. "news", "technology" ("all" for every section)
    #[arg(long)]
    section: Option<String>,

    /// Search keywords
    #[arg(long, value_name = "KEYWORDS")]
    query: Option<String>,

    /// Number of results to request
    #[arg(long, value_name = "N")]
    page_size: Option<String>,

    /// Open the Nth listed item (1-based) in the default browser
    #[arg(long, value_name = "N", conflicts_with = "watch")]
    open: Option<usize>,

    /// Keep running and refetch whenever the config file's filters change
    #[arg(long)]
    watch: bool,

    /// How often to re-read the config file in watch mode
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    watch_interval_secs: u64,
}

impl Args {
    /// Load the config file and layer command-line overrides on top.
    fn load_feed_config(&self, path: &Path) -> Result<FeedConfig> {
        let mut config = Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        if let Some(section) = &self.section {
            config.section = section.clone();
        }
        if let Some(query) = &self.query {
            config.search_keywords = query.clone();
        }
        if let Some(page_size) = &self.page_size {
            config.page_size = PageSizeSetting::Text(page_size.clone());
        }

        config.feed_config().context("Invalid feed configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let feed_config = args.load_feed_config(&config_path)?;

    let client = build_client().context("Failed to build HTTP client")?;
    let (mut coordinator, mut completion_rx) =
        FeedCoordinator::new(client, Arc::new(RouteProbe::default()));

    coordinator.start(&feed_config);

    if args.watch {
        return watch(&args, &config_path, feed_config, coordinator, completion_rx).await;
    }

    let state = wait_for_result(&mut coordinator, &mut completion_rx).await?;
    print_state(state);

    match state {
        FeedState::Failed(_) => std::process::exit(1),
        FeedState::Delivered(items) => {
            if let Some(n) = args.open {
                let item = n
                    .checked_sub(1)
                    .and_then(|idx| items.get(idx))
                    .with_context(|| format!("No item #{} in a list of {}", n, items.len()))?;
                open_item(item).context("Failed to open article")?;
            }
        }
        FeedState::Idle | FeedState::Loading => {}
    }

    Ok(())
}

/// Drain completions until the coordinator accepts one.
async fn wait_for_result<'a>(
    coordinator: &'a mut FeedCoordinator,
    rx: &mut mpsc::Receiver<FetchCompletion>,
) -> Result<&'a FeedState> {
    while let Some(completion) = rx.recv().await {
        if coordinator.complete(completion).is_some() {
            return Ok(coordinator.state());
        }
    }
    anyhow::bail!("Fetch task ended without reporting a result")
}

/// Re-read the config file on an interval and refetch when the filters change.
async fn watch(
    args: &Args,
    config_path: &Path,
    mut current: FeedConfig,
    mut coordinator: FeedCoordinator,
    mut completion_rx: mpsc::Receiver<FetchCompletion>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(args.watch_interval_secs.max(1)));
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            Some(completion) = completion_rx.recv() => {
                if let Some(state) = coordinator.complete(completion) {
                    print_state(state);
                }
            }
            _ = ticker.tick() => {
                match args.load_feed_config(config_path) {
                    Ok(next) if current.requires_refresh(&next) => {
                        tracing::info!(section = next.section(), "Configuration changed, refreshing");
                        println!("\nLoading...");
                        coordinator.start(&next);
                        current = next;
                    }
                    Ok(next) => current = next,
                    Err(e) => tracing::warn!(error = %e, "Ignoring invalid configuration"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                coordinator.reset();
                break;
            }
        }
    }

    Ok(())
}

fn print_state(state: &FeedState) {
    match state {
        FeedState::Delivered(items) if items.is_empty() => println!("No news found."),
        FeedState::Delivered(items) => {
            for (idx, item) in items.iter().enumerate() {
                print_item(idx + 1, item);
            }
        }
        FeedState::Failed(error) => eprintln!("{}", failure_message(error)),
        FeedState::Idle | FeedState::Loading => {}
    }
}

fn print_item(number: usize, item: &NewsItem) {
    println!("{:>3}. [{}] {}", number, item.section(), item.title());
    println!("     {} | {} {}", item.author(), item.date_line(), item.time_line());
    println!("     {}", item.link());
}

fn failure_message(error: &FetchError) -> String {
    match error {
        FetchError::NetworkUnavailable => "No internet connection.".to_string(),
        FetchError::HttpStatus(401 | 403) => {
            format!("{error} (check your API key or set GUARDIAN_API_KEY)")
        }
        e if e.is_transport() => format!("Could not reach the news service: {e}"),
        e => format!("Could not load news: {e}"),
    }
}
