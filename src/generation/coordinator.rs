// src/generation/coordinator.rs
use super::history::RecentPosts;
use super::request::{GenerationRequest, GenerationResult};
use super::usage::SourceUsage;
use crate::cache::BoundedCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::feeds::{Generator, MarketSnapshot, NewsItem, SocialSnapshot};
use crate::jobs::MARKET_SNAPSHOT_KEY;
use crate::publisher::Publisher;
use crate::stats::StatsTracker;
use crate::utils::{timing::Timer, truncate_chars};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl GenerationState {
    fn as_u8(self) -> u8 {
        match self {
            GenerationState::Idle => 0,
            GenerationState::Running => 1,
            GenerationState::Succeeded => 2,
            GenerationState::Failed => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => GenerationState::Running,
            2 => GenerationState::Succeeded,
            3 => GenerationState::Failed,
            _ => GenerationState::Idle,
        }
    }
}

/// The three signal caches, shared between their refresh jobs (writers) and the coordinator
/// (reader).
#[derive(Clone)]
pub struct SignalCaches {
    pub news: Arc<BoundedCache<NewsItem>>,
    pub social: Arc<BoundedCache<SocialSnapshot>>,
    pub market: Arc<BoundedCache<MarketSnapshot>>,
}

impl SignalCaches {
    pub fn new(config: &Config, clock: SharedClock) -> Self {
        Self {
            news: Arc::new(BoundedCache::new(
                "news",
                config.news_cache_capacity,
                clock.clone(),
            )),
            social: Arc::new(BoundedCache::new(
                "social",
                config.monitored_accounts.len().max(1),
                clock.clone(),
            )),
            market: Arc::new(BoundedCache::new("market", 1, clock)),
        }
    }
}

/// Returns the state to `Idle` on every exit path of a trigger.
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0
            .store(GenerationState::Idle.as_u8(), Ordering::SeqCst);
    }
}

/// Single-flight generation pipeline: snapshot, generate, dedupe, publish.
pub struct GenerationCoordinator {
    state: AtomicU8,
    last_outcome: AtomicU8,
    caches: SignalCaches,
    accounts: Vec<String>,
    examples: Vec<String>,
    generator: Arc<dyn Generator>,
    publisher: Arc<Publisher>,
    history: RecentPosts,
    usage: SourceUsage,
    stats: Arc<StatsTracker>,
    clock: SharedClock,
    generation_timeout: Duration,
    max_news: usize,
    max_pools: usize,
}

impl GenerationCoordinator {
    pub fn new(
        config: &Config,
        caches: SignalCaches,
        generator: Arc<dyn Generator>,
        publisher: Arc<Publisher>,
        examples: Vec<String>,
        stats: Arc<StatsTracker>,
        clock: SharedClock,
    ) -> Self {
        Self {
            state: AtomicU8::new(GenerationState::Idle.as_u8()),
            last_outcome: AtomicU8::new(GenerationState::Idle.as_u8()),
            caches,
            accounts: config.monitored_accounts.clone(),
            examples,
            generator,
            publisher,
            history: RecentPosts::new(
                config.duplicate_window(),
                config.duplicate_similarity_threshold,
            ),
            usage: SourceUsage::new(config.article_reuse_window(), config.token_reuse_window()),
            stats,
            clock,
            generation_timeout: config.generation_timeout(),
            max_news: config.max_news_per_request.max(1),
            max_pools: config.max_pools_per_request.max(1),
        }
    }

    pub fn state(&self) -> GenerationState {
        GenerationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Terminal state of the most recent trigger, `Idle` if none has finished yet.
    pub fn last_outcome(&self) -> GenerationState {
        GenerationState::from_u8(self.last_outcome.load(Ordering::SeqCst))
    }

    pub fn history(&self) -> &RecentPosts {
        &self.history
    }

    pub fn usage(&self) -> &SourceUsage {
        &self.usage
    }

    fn finish(&self, outcome: GenerationState) {
        self.state.store(outcome.as_u8(), Ordering::SeqCst);
        self.last_outcome.store(outcome.as_u8(), Ordering::SeqCst);
    }

    /// Reads every cache once. Cross-cache consistency is not guaranteed. Articles and pool
    /// tokens used by a recent post are left out.
    async fn build_request(&self, now: DateTime<Utc>) -> GenerationRequest {
        let news = self.caches.news.snapshot_all().await;
        let news = self.usage.unused_articles(news, now).await;
        let skip = news.len().saturating_sub(self.max_news);
        let news: Vec<NewsItem> = news.into_iter().skip(skip).collect();

        let mut social = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            if let Some(snapshot) = self.caches.social.get_allow_stale(account).await {
                social.push(snapshot);
            }
        }

        let market = match self.caches.market.get_allow_stale(MARKET_SNAPSHOT_KEY).await {
            Some(mut snapshot) => {
                let mut pools = self.usage.fresh_pools(snapshot.pools, now).await;
                pools.truncate(self.max_pools);
                snapshot.pools = pools;
                Some(snapshot).filter(|s| !s.pools.is_empty())
            }
            None => None,
        };

        GenerationRequest::new(news, social, market, self.examples.clone(), now)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let text = match tokio::time::timeout(
            self.generation_timeout,
            self.generator.generate(request),
        )
        .await
        {
            Err(_) => return Err(BotError::GenerationTimeout(self.generation_timeout)),
            Ok(Err(e @ (BotError::GenerationError(_) | BotError::GenerationTimeout(_)))) => {
                return Err(e)
            }
            Ok(Err(other)) => return Err(BotError::GenerationError(other.to_string())),
            Ok(Ok(text)) => text,
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(BotError::GenerationError(
                "generator returned empty text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn run_pipeline(&self) -> Result<GenerationResult> {
        let mut timer = Timer::start("generation pipeline");

        let request = self.build_request(self.clock.now()).await;
        if request.is_cold() {
            info!("Generating from examples only (no cached signals yet)");
        }
        debug!(
            "Request {}: {} news, {} social, market: {}",
            request.id,
            request.news.len(),
            request.social.len(),
            request.market.is_some()
        );
        timer.stage("snapshot");

        let text = self.generate(&request).await?;
        timer.stage("generate");

        let generated_at = self.clock.now();
        self.history.check(&text, generated_at).await?;

        self.state
            .store(GenerationState::Succeeded.as_u8(), Ordering::SeqCst);
        let receipt = self.publisher.publish(&text).await?;
        timer.stage("publish");

        let published_at = self.clock.now();
        self.stats.record_generation(published_at);
        self.history.record(&text, published_at).await;
        self.usage.record(&request, published_at).await;
        timer.finish_warn_over(self.generation_timeout);

        Ok(GenerationResult {
            id: request.id,
            source_snapshot_ids: request.source_snapshot_ids(),
            text,
            generated_at,
            post_id: receipt.post_id,
            confirmed: receipt.confirmed,
        })
    }

    /// Runs the pipeline once. A trigger arriving while another is in flight gets `Busy`
    /// immediately.
    pub async fn trigger(&self) -> Result<GenerationResult> {
        if self
            .state
            .compare_exchange(
                GenerationState::Idle.as_u8(),
                GenerationState::Running.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("Generation trigger rejected: already running");
            return Err(BotError::Busy);
        }
        let _idle = IdleOnDrop(&self.state);

        match self.run_pipeline().await {
            Ok(result) => {
                self.finish(GenerationState::Succeeded);
                info!(
                    "Generation {} published: {}",
                    result.id,
                    truncate_chars(&result.text, 80)
                );
                Ok(result)
            }
            Err(e) => {
                self.finish(GenerationState::Failed);
                match &e {
                    BotError::DuplicateContent(_) => warn!("Generation skipped: {}", e),
                    _ => error!("Generation failed: {}", e),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::RetryPolicy;
    use crate::testing::{sample_news_item, sample_pool, MockGenerator, MockPublisher};
    use pretty_assertions::assert_eq;

    struct Fixture {
        coordinator: Arc<GenerationCoordinator>,
        caches: SignalCaches,
        generator: Arc<MockGenerator>,
        publisher: Arc<MockPublisher>,
        stats: Arc<StatsTracker>,
    }

    fn fixture(generator: MockGenerator, config: Config) -> Fixture {
        let clock = Arc::new(ManualClock::at_epoch());
        let caches = SignalCaches::new(&config, clock.clone());
        let generator = Arc::new(generator);
        let publisher = Arc::new(MockPublisher::new());
        let stats = Arc::new(StatsTracker::new());
        let coordinator = Arc::new(GenerationCoordinator::new(
            &config,
            caches.clone(),
            generator.clone(),
            Arc::new(Publisher::new(
                publisher.clone(),
                RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
                Duration::from_secs(1),
            )),
            vec!["example post".to_string()],
            stats.clone(),
            clock,
        ));
        Fixture {
            coordinator,
            caches,
            generator,
            publisher,
            stats,
        }
    }

    #[tokio::test]
    async fn test_news_snapshot_keeps_newest_items() {
        let config = Config {
            max_news_per_request: 2,
            ..Config::default()
        };
        let f = fixture(MockGenerator::replying("fresh take"), config);
        for i in 0..4 {
            let item = sample_news_item(i);
            f.caches
                .news
                .put(&item.url, item.clone(), Duration::from_secs(600))
                .await;
        }

        let result = f.coordinator.trigger().await.unwrap();
        let seen = f.generator.requests().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].news.iter().map(|n| n.url.clone()).collect::<Vec<_>>(),
            vec![sample_news_item(2).url, sample_news_item(3).url]
        );
        assert_eq!(result.source_snapshot_ids.len(), 2);
        assert_eq!(seen[0].examples, vec!["example post".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_text_is_generation_error() {
        let f = fixture(MockGenerator::replying("   "), Config::default());
        let err = f.coordinator.trigger().await.unwrap_err();

        assert!(matches!(err, BotError::GenerationError(_)));
        assert_eq!(f.coordinator.state(), GenerationState::Idle);
        assert_eq!(f.coordinator.last_outcome(), GenerationState::Failed);
        assert_eq!(f.publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_collaborator_error_maps_to_generation_error() {
        let generator = MockGenerator::replying("unused");
        generator.set_failing(true);
        let f = fixture(generator, Config::default());

        let err = f.coordinator.trigger().await.unwrap_err();
        assert!(matches!(err, BotError::GenerationError(_)));
        assert_eq!(f.stats.snapshot().tweets_generated_total, 0);
    }

    #[tokio::test]
    async fn test_duplicate_of_recent_post_is_not_published() {
        let f = fixture(
            MockGenerator::replying("solana volume is exploding this week"),
            Config::default(),
        );
        f.coordinator.trigger().await.unwrap();

        let err = f.coordinator.trigger().await.unwrap_err();
        assert!(matches!(err, BotError::DuplicateContent(_)));
        assert_eq!(f.publisher.live_posts().await.len(), 1);
        assert_eq!(f.stats.snapshot().tweets_generated_total, 1);
        assert_eq!(f.coordinator.history().len().await, 1);
    }

    #[tokio::test]
    async fn test_articles_from_a_published_post_are_not_reused() {
        let f = fixture(
            MockGenerator::replying("solana volume is exploding this week"),
            Config::default(),
        );
        for i in 0..3 {
            let item = sample_news_item(i);
            f.caches
                .news
                .put(&item.url, item.clone(), Duration::from_secs(600))
                .await;
        }
        f.coordinator.trigger().await.unwrap();

        let item = sample_news_item(3);
        f.caches
            .news
            .put(&item.url, item.clone(), Duration::from_secs(600))
            .await;
        f.generator.set_reply("memecoin rotation looks tired today").await;
        f.coordinator.trigger().await.unwrap();

        let seen = f.generator.requests().await;
        assert_eq!(seen[0].news.len(), 3);
        assert_eq!(seen[1].news, vec![sample_news_item(3)]);
        assert_eq!(f.publisher.live_posts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_pools_with_recently_mentioned_tokens_are_not_reused() {
        let f = fixture(
            MockGenerator::replying("solana volume is exploding this week"),
            Config::default(),
        );
        let at = Utc::now();
        let snapshot = |pools| MarketSnapshot {
            fetched_at: at,
            pools,
        };
        f.caches
            .market
            .put(
                MARKET_SNAPSHOT_KEY,
                snapshot(vec![sample_pool("SOL")]),
                Duration::from_secs(600),
            )
            .await;
        f.coordinator.trigger().await.unwrap();

        let mut wif = sample_pool("WIF");
        wif.quote_token = "JUP".to_string();
        f.caches
            .market
            .put(
                MARKET_SNAPSHOT_KEY,
                snapshot(vec![sample_pool("SOL"), sample_pool("BONK"), wif.clone()]),
                Duration::from_secs(600),
            )
            .await;
        f.generator.set_reply("memecoin rotation looks tired today").await;
        f.coordinator.trigger().await.unwrap();

        // Only the pool trading neither SOL nor USDC is left; after that nothing is.
        f.generator.set_reply("quiet tape, nobody is bidding anything").await;
        f.coordinator.trigger().await.unwrap();

        let seen = f.generator.requests().await;
        assert_eq!(seen[1].market.as_ref().map(|m| m.pools.clone()), Some(vec![wif]));
        assert!(seen[2].market.is_none());
    }
}
