// src/jobs/market.rs
use super::{fetch_with_timeout, RefreshReport, MARKET_JOB};
use crate::cache::BoundedCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::Result;
use crate::feeds::{MarketFetcher, MarketSnapshot};
use crate::scheduler::ScheduledTask;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Single global key of the market cache
pub const MARKET_SNAPSHOT_KEY: &str = "trending";

pub struct MarketRefreshJob {
    fetcher: Arc<dyn MarketFetcher>,
    cache: Arc<BoundedCache<MarketSnapshot>>,
    clock: SharedClock,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl MarketRefreshJob {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn MarketFetcher>,
        cache: Arc<BoundedCache<MarketSnapshot>>,
        clock: SharedClock,
    ) -> Self {
        Self {
            fetcher,
            cache,
            clock,
            ttl: Duration::from_secs(config.market_cache_ttl_secs),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    /// Replaces the snapshot on success. On failure the previous snapshot stays.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let mut report = RefreshReport::new(MARKET_JOB);

        let pools = fetch_with_timeout(
            "trending pools fetch",
            self.fetch_timeout,
            self.fetcher.fetch_trending_pools(),
        )
        .await?;
        report.fetched = pools.len();

        let snapshot = MarketSnapshot {
            fetched_at: self.clock.now(),
            pools,
        };
        self.cache.put(MARKET_SNAPSHOT_KEY, snapshot, self.ttl).await;
        report.cached = 1;

        Ok(report)
    }
}

#[async_trait]
impl ScheduledTask for MarketRefreshJob {
    async fn run(&self) -> Result<()> {
        let report = self.refresh().await?;
        info!("{}", report.summary());
        Ok(())
    }
}
