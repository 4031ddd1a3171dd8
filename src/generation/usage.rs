// src/generation/usage.rs
//! Which signals already went into a published post. Articles stay out of later requests for
//! the article window; pools whose base or quote token was mentioned stay out for the token
//! window.

use super::request::GenerationRequest;
use crate::feeds::{NewsItem, TrendingPool};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct UsageLog {
    articles: HashMap<String, DateTime<Utc>>,
    tokens: HashMap<String, DateTime<Utc>>,
}

pub struct SourceUsage {
    log: Mutex<UsageLog>,
    article_window: ChronoDuration,
    token_window: ChronoDuration,
}

fn token_key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn within(used_at: Option<&DateTime<Utc>>, window: ChronoDuration, now: DateTime<Utc>) -> bool {
    used_at.map_or(false, |at| now - *at < window)
}

impl SourceUsage {
    pub fn new(article_window: ChronoDuration, token_window: ChronoDuration) -> Self {
        Self {
            log: Mutex::new(UsageLog::default()),
            article_window,
            token_window,
        }
    }

    /// Drops news items already used by a post inside the article window.
    pub async fn unused_articles(
        &self,
        items: Vec<NewsItem>,
        now: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let log = self.log.lock().await;
        let before = items.len();
        let kept: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| !within(log.articles.get(&item.url), self.article_window, now))
            .collect();
        if kept.len() < before {
            debug!("Skipping {} already used article(s)", before - kept.len());
        }
        kept
    }

    /// Drops pools whose base or quote token was mentioned inside the token window.
    pub async fn fresh_pools(
        &self,
        pools: Vec<TrendingPool>,
        now: DateTime<Utc>,
    ) -> Vec<TrendingPool> {
        let log = self.log.lock().await;
        pools
            .into_iter()
            .filter(|pool| {
                [&pool.base_token, &pool.quote_token]
                    .iter()
                    .all(|t| !within(log.tokens.get(&token_key(t)), self.token_window, now))
            })
            .collect()
    }

    /// Marks the request's articles and pool tokens as used at `at`.
    pub async fn record(&self, request: &GenerationRequest, at: DateTime<Utc>) {
        let mut log = self.log.lock().await;

        let article_cutoff = at - self.article_window;
        let token_cutoff = at - self.token_window;
        log.articles.retain(|_, used_at| *used_at > article_cutoff);
        log.tokens.retain(|_, used_at| *used_at > token_cutoff);

        for item in &request.news {
            log.articles.insert(item.url.clone(), at);
        }
        if let Some(market) = &request.market {
            for pool in &market.pools {
                for symbol in [&pool.base_token, &pool.quote_token] {
                    let key = token_key(symbol);
                    if !key.is_empty() {
                        log.tokens.insert(key, at);
                    }
                }
            }
        }
    }

    pub async fn is_article_used(&self, url: &str, now: DateTime<Utc>) -> bool {
        within(self.log.lock().await.articles.get(url), self.article_window, now)
    }

    pub async fn is_token_recent(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let log = self.log.lock().await;
        within(log.tokens.get(&token_key(symbol)), self.token_window, now)
    }
}
