// src/jobs/mod.rs
//! Refresh jobs: fetch from one collaborator, transform, write one cache.

pub mod market;
pub mod news;
pub mod social;

pub use market::{MarketRefreshJob, MARKET_SNAPSHOT_KEY};
pub use news::NewsRefreshJob;
pub use social::SocialRefreshJob;

use crate::error::{BotError, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

pub const NEWS_JOB: &str = "news";
pub const SOCIAL_JOB: &str = "social";
pub const MARKET_JOB: &str = "market";

/// Outcome of one refresh run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub job: String,
    pub fetched: usize,
    pub cached: usize,
    pub dropped: usize,
    /// Valid but over the per-run cap; retried next run
    pub deferred: usize,
    pub soft_failures: usize,
}

impl RefreshReport {
    pub fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            ..Default::default()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} refresh: fetched {}, cached {}, dropped {}, deferred {}, soft failures {}",
            self.job, self.fetched, self.cached, self.dropped, self.deferred, self.soft_failures
        )
    }
}

/// Runs a fetch under `limit`; elapsing it is a `FetchError`.
pub(crate) async fn fetch_with_timeout<T, F>(what: &str, limit: Duration, fetch: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(BotError::FetchError(format!(
            "{} timed out after {:?}",
            what, limit
        ))),
    }
}
