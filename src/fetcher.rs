use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str = concat!("gator/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("malformed feed: {0}")]
    Parse(#[from] parser::ParseFeedError),
    #[error("fetch cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch and parse the feed at `url`. Resolves to `Cancelled` as soon as
    /// `cancel` fires, abandoning the request.
    pub async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedFeed, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.fetch_inner(url) => result,
        }
    }

    async fn fetch_inner(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        debug!(url, "fetching feed");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let bytes = response.bytes().await?;

        parse_feed(&bytes)
    }
}

/// Parse an RSS (or Atom) document and unescape HTML entities in the
/// title and description fields.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, FetchError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let description = entry
                .summary
                .map(|t| t.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            ParsedItem {
                title: unescape_html(&entry.title.map(|t| t.content).unwrap_or_default()),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                description: unescape_html(&description),
                published: entry.published.or(entry.updated),
            }
        })
        .collect();

    Ok(ParsedFeed {
        title: unescape_html(&feed.title.map(|t| t.content).unwrap_or_default()),
        link: feed.links.first().map(|l| l.href.clone()).unwrap_or_default(),
        description: unescape_html(&feed.description.map(|t| t.content).unwrap_or_default()),
        items,
    })
}

/// Decode HTML character references against the full HTML5 entity set in a
/// single pass. Unknown references are kept verbatim.
pub fn unescape_html(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
