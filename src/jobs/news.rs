// src/jobs/news.rs
use super::{fetch_with_timeout, RefreshReport, NEWS_JOB};
use crate::cache::BoundedCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::feeds::{NewsFetcher, NewsItem, RawArticle, Summarizer};
use crate::scheduler::ScheduledTask;
use crate::stats::StatsTracker;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SUMMARIZE_CONCURRENCY: usize = 4;

pub struct NewsRefreshJob {
    fetcher: Arc<dyn NewsFetcher>,
    summarizer: Arc<dyn Summarizer>,
    cache: Arc<BoundedCache<NewsItem>>,
    stats: Arc<StatsTracker>,
    clock: SharedClock,
    ttl: Duration,
    fetch_timeout: Duration,
    summarize_timeout: Duration,
    max_age: ChronoDuration,
    max_summaries: usize,
}

impl NewsRefreshJob {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn NewsFetcher>,
        summarizer: Arc<dyn Summarizer>,
        cache: Arc<BoundedCache<NewsItem>>,
        stats: Arc<StatsTracker>,
        clock: SharedClock,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            cache,
            stats,
            clock,
            ttl: Duration::from_secs(config.news_cache_ttl_secs),
            fetch_timeout: config.fetch_timeout(),
            summarize_timeout: config.summarize_timeout(),
            max_age: config.news_max_age(),
            max_summaries: config.news_max_summaries_per_run.max(1),
        }
    }

    /// Picks the articles worth summarizing: unseen urls, unique titles, recent enough.
    async fn select_new(
        &self,
        articles: Vec<RawArticle>,
        report: &mut RefreshReport,
    ) -> Vec<RawArticle> {
        let now = self.clock.now();
        let oldest_allowed = now - self.max_age;
        let mut seen_urls = HashSet::new();
        let mut seen_titles = HashSet::new();
        let mut selected = Vec::new();

        for article in articles {
            let url = article.url.trim().to_string();
            let title_key = article.title.trim().to_lowercase();

            if url.is_empty() || !seen_urls.insert(url.clone()) {
                report.dropped += 1;
                continue;
            }
            if !title_key.is_empty() && !seen_titles.insert(title_key) {
                debug!("Duplicate title in fetch: {}", article.title);
                report.dropped += 1;
                continue;
            }
            if matches!(article.published_at, Some(at) if at < oldest_allowed) {
                debug!("Skipping old article: {}", article.title);
                report.dropped += 1;
                continue;
            }
            if self.cache.get(&url).await.is_some() {
                report.dropped += 1;
                continue;
            }
            // Left uncached, so the next run picks it up.
            if selected.len() >= self.max_summaries {
                report.deferred += 1;
                continue;
            }

            selected.push(RawArticle { url, ..article });
        }
        selected
    }

    async fn summarize(&self, article: &RawArticle) -> Result<String> {
        let summary = match tokio::time::timeout(
            self.summarize_timeout,
            self.summarizer.summarize(&article.title, &article.raw_body),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(BotError::SummarizationError(format!(
                    "timed out after {:?}",
                    self.summarize_timeout
                )))
            }
        };

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(BotError::SummarizationError("empty summary".to_string()));
        }
        Ok(summary)
    }

    pub async fn refresh(&self) -> Result<RefreshReport> {
        let mut report = RefreshReport::new(NEWS_JOB);

        let articles =
            fetch_with_timeout("news fetch", self.fetch_timeout, self.fetcher.fetch()).await?;
        report.fetched = articles.len();

        let candidates = self.select_new(articles, &mut report).await;
        debug!("{} new articles to summarize", candidates.len());

        let outcomes: Vec<(RawArticle, Result<String>)> = stream::iter(candidates)
            .map(|article| async move {
                let summary = self.summarize(&article).await;
                (article, summary)
            })
            .buffered(SUMMARIZE_CONCURRENCY)
            .collect()
            .await;

        for (article, summary) in outcomes {
            match summary {
                Ok(summary) => {
                    let key = article.url.clone();
                    self.cache
                        .put(&key, NewsItem::from_article(article, summary), self.ttl)
                        .await;
                    report.cached += 1;
                }
                Err(e) => {
                    warn!("Dropping article '{}': {}", article.title, e);
                    report.soft_failures += 1;
                }
            }
        }

        self.stats.record_articles_processed(report.cached as u64);
        let purged = self.cache.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired news entries", purged);
        }

        Ok(report)
    }
}

#[async_trait]
impl ScheduledTask for NewsRefreshJob {
    async fn run(&self) -> Result<()> {
        let report = self.refresh().await?;
        info!("{}", report.summary());
        Ok(())
    }
}
