// src/jobs/social.rs
use super::{fetch_with_timeout, RefreshReport, SOCIAL_JOB};
use crate::cache::BoundedCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::feeds::{SocialFetcher, SocialSnapshot};
use crate::scheduler::ScheduledTask;
use async_trait::async_trait;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

/// Replaces each monitored account's snapshot wholesale. An account whose fetch fails keeps
/// its previous snapshot.
pub struct SocialRefreshJob {
    fetcher: Arc<dyn SocialFetcher>,
    cache: Arc<BoundedCache<SocialSnapshot>>,
    clock: SharedClock,
    accounts: Vec<String>,
    ttl: Duration,
    fetch_timeout: Duration,
    max_posts: usize,
}

impl SocialRefreshJob {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn SocialFetcher>,
        cache: Arc<BoundedCache<SocialSnapshot>>,
        clock: SharedClock,
    ) -> Self {
        Self {
            fetcher,
            cache,
            clock,
            accounts: config.monitored_accounts.clone(),
            ttl: Duration::from_secs(config.social_cache_ttl_secs),
            fetch_timeout: config.fetch_timeout(),
            max_posts: config.social_max_posts_per_account.max(1),
        }
    }

    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    pub async fn refresh(&self) -> Result<RefreshReport> {
        let mut report = RefreshReport::new(SOCIAL_JOB);

        let mut accounts = self.accounts.clone();
        accounts.shuffle(&mut rand::thread_rng());

        for account in &accounts {
            let fetched = fetch_with_timeout(
                &format!("posts for @{}", account),
                self.fetch_timeout,
                self.fetcher.fetch_account(account),
            )
            .await;

            match fetched {
                Ok(mut posts) => {
                    report.fetched += posts.len();
                    if posts.len() > self.max_posts {
                        report.dropped += posts.len() - self.max_posts;
                        posts.truncate(self.max_posts);
                    }
                    debug!("@{}: {} posts", account, posts.len());

                    let snapshot = SocialSnapshot {
                        account: account.clone(),
                        posts,
                        last_fetched_at: self.clock.now(),
                    };
                    self.cache.put(account, snapshot, self.ttl).await;
                    report.cached += 1;
                }
                Err(e) => {
                    warn!("Keeping previous snapshot for @{}: {}", account, e);
                    report.soft_failures += 1;
                }
            }
        }

        if !accounts.is_empty() && report.soft_failures == accounts.len() {
            return Err(BotError::FetchError(format!(
                "all {} monitored accounts failed",
                accounts.len()
            )));
        }

        Ok(report)
    }
}

#[async_trait]
impl ScheduledTask for SocialRefreshJob {
    async fn run(&self) -> Result<()> {
        let report = self.refresh().await?;
        info!("{}", report.summary());
        Ok(())
    }
}
