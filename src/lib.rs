//! Fetch, parse, and refresh a Guardian news feed.
//!
//! - [`feed`] - query building, fetching, parsing, and the refresh coordinator
//! - [`config`] - TOML configuration and validation into a [`feed::FeedConfig`]
//! - [`util`] - URL validation and task helpers

pub mod config;
pub mod feed;
pub mod util;
