// src/stats.rs
use crate::clock::millis_to_datetime;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl EngineStatus {
    fn as_u8(self) -> u8 {
        match self {
            EngineStatus::Starting => 0,
            EngineStatus::Running => 1,
            EngineStatus::ShuttingDown => 2,
            EngineStatus::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => EngineStatus::Starting,
            1 => EngineStatus::Running,
            2 => EngineStatus::ShuttingDown,
            _ => EngineStatus::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Starting => "STARTING",
            EngineStatus::Running => "RUNNING",
            EngineStatus::ShuttingDown => "SHUTTING_DOWN",
            EngineStatus::Stopped => "STOPPED",
        }
    }
}

/// Point-in-time copy of the process-wide counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub articles_processed_total: u64,
    pub tweets_generated_total: u64,
    pub next_news_refresh_at: Option<DateTime<Utc>>,
    pub next_social_refresh_at: Option<DateTime<Utc>>,
    pub next_market_refresh_at: Option<DateTime<Utc>>,
    pub last_generation_at: Option<DateTime<Utc>>,
    pub status: EngineStatus,
}

/// Process-wide counters. Each field is written by exactly one component through the
/// methods below; readers only ever see [`Stats`] copies.
pub struct StatsTracker {
    articles_processed_total: AtomicU64,
    tweets_generated_total: AtomicU64,
    // Millisecond timestamps, 0 = unset
    next_news_refresh_ms: AtomicI64,
    next_social_refresh_ms: AtomicI64,
    next_market_refresh_ms: AtomicI64,
    last_generation_ms: AtomicI64,
    status: AtomicU8,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn load_timestamp(cell: &AtomicI64) -> Option<DateTime<Utc>> {
    match cell.load(Ordering::SeqCst) {
        0 => None,
        ms => millis_to_datetime(ms),
    }
}

fn store_timestamp(cell: &AtomicI64, at: Option<DateTime<Utc>>) {
    cell.store(at.map(|t| t.timestamp_millis()).unwrap_or(0), Ordering::SeqCst);
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            articles_processed_total: AtomicU64::new(0),
            tweets_generated_total: AtomicU64::new(0),
            next_news_refresh_ms: AtomicI64::new(0),
            next_social_refresh_ms: AtomicI64::new(0),
            next_market_refresh_ms: AtomicI64::new(0),
            last_generation_ms: AtomicI64::new(0),
            status: AtomicU8::new(EngineStatus::Starting.as_u8()),
        }
    }

    /// Adds `n` summarized articles. Called by the news refresh job.
    pub fn record_articles_processed(&self, n: u64) {
        self.articles_processed_total.fetch_add(n, Ordering::SeqCst);
    }

    /// Counts one confirmed publish. Called by the generation coordinator only.
    pub fn record_generation(&self, at: DateTime<Utc>) {
        self.tweets_generated_total.fetch_add(1, Ordering::SeqCst);
        store_timestamp(&self.last_generation_ms, Some(at));
    }

    pub fn set_next_news_refresh(&self, at: Option<DateTime<Utc>>) {
        store_timestamp(&self.next_news_refresh_ms, at);
    }

    pub fn set_next_social_refresh(&self, at: Option<DateTime<Utc>>) {
        store_timestamp(&self.next_social_refresh_ms, at);
    }

    pub fn set_next_market_refresh(&self, at: Option<DateTime<Utc>>) {
        store_timestamp(&self.next_market_refresh_ms, at);
    }

    pub fn set_status(&self, status: EngineStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            articles_processed_total: self.articles_processed_total.load(Ordering::SeqCst),
            tweets_generated_total: self.tweets_generated_total.load(Ordering::SeqCst),
            next_news_refresh_at: load_timestamp(&self.next_news_refresh_ms),
            next_social_refresh_at: load_timestamp(&self.next_social_refresh_ms),
            next_market_refresh_at: load_timestamp(&self.next_market_refresh_ms),
            last_generation_at: load_timestamp(&self.last_generation_ms),
            status: self.status(),
        }
    }

    /// Logs the current counter values.
    pub fn log_stats(&self) {
        let stats = self.snapshot();
        let fmt = |at: Option<DateTime<Utc>>| {
            at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
        };
        info!("Current Stats ({}):", stats.status.as_str());
        info!("  Articles Processed: {}", stats.articles_processed_total);
        info!("  Tweets Generated: {}", stats.tweets_generated_total);
        info!("  Last Generation: {}", fmt(stats.last_generation_at));
        info!("  Next News Refresh: {}", fmt(stats.next_news_refresh_at));
        info!("  Next Social Refresh: {}", fmt(stats.next_social_refresh_at));
        info!("  Next Market Refresh: {}", fmt(stats.next_market_refresh_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fresh_tracker_is_empty() {
        let stats = StatsTracker::new().snapshot();
        assert_eq!(stats.articles_processed_total, 0);
        assert_eq!(stats.tweets_generated_total, 0);
        assert_eq!(stats.last_generation_at, None);
        assert_eq!(stats.status, EngineStatus::Starting);
    }

    #[test]
    fn test_counters_and_timestamps() {
        let tracker = StatsTracker::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        tracker.record_articles_processed(4);
        tracker.record_articles_processed(1);
        tracker.record_generation(at);
        tracker.set_next_news_refresh(Some(at));
        tracker.set_status(EngineStatus::Running);

        let stats = tracker.snapshot();
        assert_eq!(stats.articles_processed_total, 5);
        assert_eq!(stats.tweets_generated_total, 1);
        assert_eq!(stats.last_generation_at, Some(at));
        assert_eq!(stats.next_news_refresh_at, Some(at));
        assert_eq!(stats.status, EngineStatus::Running);

        tracker.set_next_news_refresh(None);
        assert_eq!(tracker.snapshot().next_news_refresh_at, None);
    }

    #[test]
    fn test_stats_serialize() {
        let tracker = StatsTracker::new();
        tracker.set_status(EngineStatus::ShuttingDown);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json["status"], "shutting_down");
        assert_eq!(json["tweets_generated_total"], 0);
    }
}
