// src/engine.rs
//! Wires caches, refresh jobs, the scheduler and the generation coordinator together and
//! exposes the outward operations.

use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::Result;
use crate::feeds::{
    Generator, MarketFetcher, NewsFetcher, SocialFetcher, SocialPublisher, Summarizer,
};
use crate::generation::{GenerationCoordinator, GenerationResult, SignalCaches};
use crate::jobs::{
    MarketRefreshJob, NewsRefreshJob, SocialRefreshJob, MARKET_JOB, NEWS_JOB, SOCIAL_JOB,
};
use crate::monitoring::{HealthInputs, HealthReport};
use crate::publisher::Publisher;
use crate::scheduler::Scheduler;
use crate::stats::{EngineStatus, Stats, StatsTracker};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// External services the engine depends on
#[derive(Clone)]
pub struct Collaborators {
    pub news_fetcher: Arc<dyn NewsFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub social_fetcher: Arc<dyn SocialFetcher>,
    pub market_fetcher: Arc<dyn MarketFetcher>,
    pub generator: Arc<dyn Generator>,
    pub publisher: Arc<dyn SocialPublisher>,
}

pub struct Engine {
    config: Arc<Config>,
    clock: SharedClock,
    stats: Arc<StatsTracker>,
    caches: SignalCaches,
    scheduler: Arc<Scheduler>,
    coordinator: Arc<GenerationCoordinator>,
    news_job: Arc<NewsRefreshJob>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    scheduling_enabled: AtomicBool,
}

/// Copies each job's next due time into the stats.
fn sync_schedule(stats: &StatsTracker, scheduler: &Scheduler) {
    stats.set_next_news_refresh(scheduler.next_run_for(NEWS_JOB));
    stats.set_next_social_refresh(scheduler.next_run_for(SOCIAL_JOB));
    stats.set_next_market_refresh(scheduler.next_run_for(MARKET_JOB));
}

impl Engine {
    pub fn new(
        config: Arc<Config>,
        collaborators: Collaborators,
        examples: Vec<String>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;
        let stats = Arc::new(StatsTracker::new());
        let caches = SignalCaches::new(&config, clock.clone());
        let scheduler = Arc::new(Scheduler::new(clock.clone()));

        let news_job = Arc::new(NewsRefreshJob::new(
            &config,
            collaborators.news_fetcher,
            collaborators.summarizer,
            caches.news.clone(),
            stats.clone(),
            clock.clone(),
        ));
        let social_job = Arc::new(SocialRefreshJob::new(
            &config,
            collaborators.social_fetcher,
            caches.social.clone(),
            clock.clone(),
        ));
        let market_job = Arc::new(MarketRefreshJob::new(
            &config,
            collaborators.market_fetcher,
            caches.market.clone(),
            clock.clone(),
        ));

        scheduler.register_job(
            NEWS_JOB,
            Duration::from_secs(config.news_refresh_interval_secs),
            news_job.clone(),
        )?;
        scheduler.register_job(
            SOCIAL_JOB,
            Duration::from_secs(config.social_refresh_interval_secs),
            social_job,
        )?;
        scheduler.register_job(
            MARKET_JOB,
            Duration::from_secs(config.market_refresh_interval_secs),
            market_job,
        )?;
        sync_schedule(&stats, &scheduler);

        let publisher = Arc::new(Publisher::from_config(collaborators.publisher, &config));
        let coordinator = Arc::new(GenerationCoordinator::new(
            &config,
            caches.clone(),
            collaborators.generator,
            publisher,
            examples,
            stats.clone(),
            clock.clone(),
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            clock,
            stats,
            caches,
            scheduler,
            coordinator,
            news_job,
            shutdown_tx,
            loop_handle: Mutex::new(None),
            scheduling_enabled: AtomicBool::new(false),
        })
    }

    /// Spawns the scheduler loop and marks the engine running.
    pub async fn start(&self) {
        let mut handle = self.loop_handle.lock().await;
        if handle.is_some() {
            warn!("Engine already started");
            return;
        }

        let scheduler = self.scheduler.clone();
        let stats = self.stats.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let tick_every = self.config.scheduler_tick();

        *handle = Some(tokio::spawn(async move {
            scheduler
                .run(tick_every, shutdown_rx, move |scheduler, _dispatched| {
                    sync_schedule(&stats, scheduler)
                })
                .await;
        }));
        self.scheduling_enabled.store(true, Ordering::SeqCst);
        self.stats.set_status(EngineStatus::Running);
        info!(
            "Engine started with jobs {:?}",
            self.scheduler.job_names()
        );
    }

    /// Marks the engine running without background refreshes; jobs only run on demand.
    pub fn start_without_scheduler(&self) {
        self.stats.set_status(EngineStatus::Running);
        info!("Engine started (scheduler disabled)");
    }

    /// Dispatches every due job once against the engine clock.
    pub fn tick(&self) -> Vec<String> {
        let dispatched = self.scheduler.tick(self.clock.now());
        sync_schedule(&self.stats, &self.scheduler);
        dispatched
    }

    pub async fn trigger_generation(&self) -> Result<GenerationResult> {
        self.coordinator.trigger().await
    }

    /// Runs the news job now, outside its cadence. Fails with `JobAlreadyRunning` if a news
    /// refresh is in flight.
    pub fn trigger_news_refresh(&self) -> Result<()> {
        self.scheduler.run_now(NEWS_JOB)
    }

    pub fn get_stats(&self) -> Stats {
        self.stats.snapshot()
    }

    pub async fn health_status(&self) -> HealthReport {
        let scheduler_running = match self.loop_handle.lock().await.as_ref() {
            Some(handle) => !handle.is_finished(),
            None => false,
        };

        HealthReport::assess(
            HealthInputs {
                status: self.stats.status(),
                scheduling_enabled: self.scheduling_enabled.load(Ordering::SeqCst),
                scheduler_running,
                in_flight_jobs: self.scheduler.in_flight_count(),
                generation: self.coordinator.state(),
            },
            self.clock.now(),
        )
    }

    /// Stops the scheduler loop, waits for in-flight jobs and logs final stats.
    pub async fn shutdown(&self) {
        info!("Shutting down engine...");
        self.stats.set_status(EngineStatus::ShuttingDown);
        if self.shutdown_tx.send(true).is_err() {
            debug!("No scheduler loop listening for shutdown");
        }

        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }
        self.scheduler.wait_idle().await;

        self.stats.set_status(EngineStatus::Stopped);
        for summary in [
            self.caches.news.summary().await,
            self.caches.social.summary().await,
            self.caches.market.summary().await,
        ] {
            info!("{}", summary);
        }
        self.stats.log_stats();
        info!("Engine stopped");
    }

    /// Awaits every in-flight refresh job.
    pub async fn wait_for_jobs(&self) {
        self.scheduler.wait_idle().await;
    }

    pub fn caches(&self) -> &SignalCaches {
        &self.caches
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    pub fn news_job(&self) -> &NewsRefreshJob {
        &self.news_job
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::BotError;
    use crate::generation::GenerationState;
    use crate::monitoring::HealthStatus;
    use crate::testing::{
        sample_article, sample_pool, MockGenerator, MockMarketFetcher, MockNewsFetcher,
        MockPublisher, MockSocialFetcher, MockSummarizer,
    };

    fn collaborators() -> Collaborators {
        Collaborators {
            news_fetcher: Arc::new(MockNewsFetcher::new(vec![sample_article(1)])),
            summarizer: Arc::new(MockSummarizer::new()),
            social_fetcher: Arc::new(MockSocialFetcher::new()),
            market_fetcher: Arc::new(MockMarketFetcher::new(vec![sample_pool("SOL")])),
            generator: Arc::new(MockGenerator::replying("gm from the engine")),
            publisher: Arc::new(MockPublisher::new()),
        }
    }

    fn engine() -> Engine {
        Engine::new(
            Arc::new(Config::default()),
            collaborators(),
            vec![],
            Arc::new(ManualClock::at_epoch()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_and_health() {
        let engine = engine();
        assert_eq!(engine.get_stats().status, EngineStatus::Starting);
        assert!(!engine.health_status().await.ok);

        engine.start().await;
        let health = engine.health_status().await;
        assert!(health.ok, "{}", health.summary);
        assert_eq!(health.generation, GenerationState::Idle);

        engine.shutdown().await;
        let health = engine.health_status().await;
        assert_eq!(health.health, HealthStatus::Unhealthy);
        assert_eq!(engine.get_stats().status, EngineStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stats_track_next_refresh_times() {
        let engine = engine();
        let first_due = engine.get_stats().next_news_refresh_at;
        assert!(first_due.is_some());

        engine.tick();
        engine.wait_for_jobs().await;

        let stats = engine.get_stats();
        assert_eq!(
            stats.next_news_refresh_at,
            first_due.map(|t| t + chrono::Duration::seconds(43200))
        );
        assert_eq!(stats.articles_processed_total, 1);
    }

    #[tokio::test]
    async fn test_manual_news_refresh() {
        let engine = engine();
        engine.start_without_scheduler();
        engine.trigger_news_refresh().unwrap();
        engine.wait_for_jobs().await;
        assert_eq!(engine.caches().news.len().await, 1);
        assert!(engine.health_status().await.ok);
    }

    #[tokio::test]
    async fn test_shutdown_without_scheduler_loop() {
        let engine = engine();
        engine.start_without_scheduler();
        engine.shutdown().await;
        assert_eq!(engine.get_stats().status, EngineStatus::Stopped);
    }

    #[test]
    fn test_out_of_range_window_is_a_config_error() {
        let config = Config {
            duplicate_window_hours: i64::MAX / 1000,
            ..Config::default()
        };
        let built = Engine::new(
            Arc::new(config),
            collaborators(),
            vec![],
            Arc::new(ManualClock::at_epoch()),
        );
        assert!(matches!(built, Err(BotError::ConfigError(_))));
    }
}
