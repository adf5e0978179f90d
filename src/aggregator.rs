use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AggregatorConfig, FailurePolicy};
use crate::db::{Database, FollowedFeed, NewPost, User};
use crate::error::{Error, Result};
use crate::fetcher::{FetchError, Fetcher};

/// Outcome of a single pass over the follow list.
#[derive(Debug, Default)]
pub struct TickReport {
    pub feeds_fetched: usize,
    pub posts_created: usize,
    /// Per-feed failures; only populated under [`FailurePolicy::Continue`].
    pub failures: Vec<(String, Error)>,
}

/// Periodically fetches every feed `user` follows and stores the items as posts.
pub struct Aggregator<'a> {
    db: &'a Database,
    fetcher: &'a Fetcher,
    user: &'a User,
    config: AggregatorConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        db: &'a Database,
        fetcher: &'a Fetcher,
        user: &'a User,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            db,
            fetcher,
            user,
            config,
        }
    }

    /// Run until `cancel` fires or, under [`FailurePolicy::Abort`], until the
    /// first feed fails. The first tick happens immediately.
    pub async fn run(&self, interval: Duration, cancel: &CancellationToken) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval {
                input: format!("{interval:?}"),
                reason: "duration must be positive".to_string(),
            });
        }

        let mut follows = self.load_follows().await?;
        info!(
            user = %self.user.name,
            feeds = follows.len(),
            interval = ?interval,
            "starting aggregation"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("aggregation stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if self.config.refresh_follows && !first {
                        follows = self.load_follows().await?;
                    }
                    first = false;

                    match self.tick(&follows, cancel).await {
                        Ok(report) => info!(
                            feeds = report.feeds_fetched,
                            posts = report.posts_created,
                            failures = report.failures.len(),
                            "tick complete"
                        ),
                        Err(Error::Fetch { source: FetchError::Cancelled, .. }) => {
                            info!("aggregation stopped mid-tick");
                            return Ok(());
                        }
                        Err(e) => {
                            error!(error = %e, "aggregation aborted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn load_follows(&self) -> Result<Vec<FollowedFeed>> {
        self.db.get_feed_follows(&self.user.name).await
    }

    /// Fetch each entry of `follows` once, in order, and store one post per item.
    pub async fn tick(
        &self,
        follows: &[FollowedFeed],
        cancel: &CancellationToken,
    ) -> Result<TickReport> {
        let mut report = TickReport::default();

        for follow in follows {
            match self.scrape_feed(follow, cancel).await {
                Ok(created) => {
                    report.feeds_fetched += 1;
                    report.posts_created += created;
                }
                Err(e @ Error::Fetch { source: FetchError::Cancelled, .. }) => return Err(e),
                Err(e) => match self.config.on_error {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Continue => {
                        warn!(
                            feed = %follow.feed_name,
                            url = %follow.url,
                            error = %e,
                            "skipping feed"
                        );
                        report.failures.push((follow.url.clone(), e));
                    }
                },
            }
        }

        Ok(report)
    }

    async fn scrape_feed(
        &self,
        follow: &FollowedFeed,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let feed = self
            .fetcher
            .fetch(&follow.url, cancel)
            .await
            .map_err(|source| Error::Fetch {
                url: follow.url.clone(),
                source,
            })?;
        self.db.mark_feed_fetched(follow.feed_id).await?;

        for item in &feed.items {
            self.db
                .add_post(&NewPost {
                    user_id: self.user.id,
                    feed_id: follow.feed_id,
                    title: Some(&item.title),
                    description: Some(&item.description),
                    url: &item.link,
                    published_at: item.published,
                })
                .await?;
        }

        info!(feed = %follow.feed_name, posts = feed.items.len(), "fetched feed");
        Ok(feed.items.len())
    }
}
