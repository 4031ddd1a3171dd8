use chrono::Duration as ChronoDuration;
use pretty_assertions::assert_eq;
use signal_post_bot::{
    config::Config,
    feeds::RawArticle,
    jobs::MARKET_SNAPSHOT_KEY,
    testing::{
        init_test_logging, sample_article, sample_pool, sample_post, MockGenerator,
        MockMarketFetcher, MockNewsFetcher, MockPublishOutcome, MockPublisher,
        MockSocialFetcher, MockSummarizer,
    },
    BotError, Clock, Collaborators, Engine, GenerationState, ManualClock,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    engine: Arc<Engine>,
    clock: Arc<ManualClock>,
    news: Arc<MockNewsFetcher>,
    social: Arc<MockSocialFetcher>,
    market: Arc<MockMarketFetcher>,
    generator: Arc<MockGenerator>,
    publisher: Arc<MockPublisher>,
}

fn test_config() -> Config {
    Config {
        monitored_accounts: vec!["alice".to_string(), "bob".to_string()],
        fetch_timeout_secs: 2,
        summarize_timeout_secs: 2,
        generation_timeout_secs: 1,
        publish_timeout_secs: 2,
        publish_base_delay_ms: 1,
        publish_max_delay_ms: 5,
        ..Config::default()
    }
}

async fn harness(
    articles: Vec<RawArticle>,
    summarizer: MockSummarizer,
    generator: MockGenerator,
    publisher: MockPublisher,
) -> Harness {
    init_test_logging();
    let clock = Arc::new(ManualClock::at_epoch());
    let news = Arc::new(MockNewsFetcher::new(articles));
    let social = Arc::new(MockSocialFetcher::new());
    social.set_posts("alice", vec![sample_post("alice", 1)]).await;
    social.set_posts("bob", vec![sample_post("bob", 1)]).await;
    let market = Arc::new(MockMarketFetcher::new(vec![sample_pool("SOL")]));
    let generator = Arc::new(generator);
    let publisher = Arc::new(publisher);

    let engine = Engine::new(
        Arc::new(test_config()),
        Collaborators {
            news_fetcher: news.clone(),
            summarizer: Arc::new(summarizer),
            social_fetcher: social.clone(),
            market_fetcher: market.clone(),
            generator: generator.clone(),
            publisher: publisher.clone(),
        },
        vec!["gm example".to_string()],
        clock.clone(),
    )
    .expect("engine builds");
    engine.start_without_scheduler();

    Harness {
        engine: Arc::new(engine),
        clock,
        news,
        social,
        market,
        generator,
        publisher,
    }
}

async fn default_harness() -> Harness {
    harness(
        (0..3).map(sample_article).collect(),
        MockSummarizer::new(),
        MockGenerator::replying("SOL volume climbing while headlines stay calm"),
        MockPublisher::new(),
    )
    .await
}

impl Harness {
    async fn refresh_round(&self) -> Vec<String> {
        let dispatched = self.engine.tick();
        self.engine.wait_for_jobs().await;
        dispatched
    }
}

#[tokio::test]
async fn concurrent_trigger_is_rejected_with_busy() {
    let h = harness(
        vec![],
        MockSummarizer::new(),
        MockGenerator::replying("one post only").held(),
        MockPublisher::new(),
    )
    .await;

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.trigger_generation().await });
    h.generator.wait_started().await;
    assert_eq!(h.engine.coordinator().state(), GenerationState::Running);

    let second = h.engine.trigger_generation().await;
    assert!(matches!(second, Err(BotError::Busy)));

    h.generator.release();
    let first = first.await.unwrap().unwrap();
    assert!(first.confirmed);
    assert_eq!(h.engine.get_stats().tweets_generated_total, 1);
    assert_eq!(h.publisher.live_posts().await.len(), 1);
    assert_eq!(h.engine.coordinator().state(), GenerationState::Idle);
}

#[tokio::test]
async fn failing_job_does_not_block_others_or_generation() {
    let h = default_harness().await;
    assert_eq!(h.refresh_round().await, vec!["market", "news", "social"]);

    h.market.set_failing(true);
    let mut fresh = sample_article(10);
    fresh.published_at = Some(h.clock.now() + ChronoDuration::hours(13));
    h.news.set_articles(vec![fresh.clone()]).await;
    h.clock.advance(ChronoDuration::hours(13));

    assert_eq!(h.refresh_round().await.len(), 3);
    assert!(h.engine.caches().news.contains_key(&fresh.url).await);
    assert_eq!(h.market.calls(), 2);

    let result = h.engine.trigger_generation().await.unwrap();
    let request = h.generator.requests().await.pop().unwrap();

    // Market is past its TTL but the last good snapshot still feeds generation.
    let market = request.market.expect("last good market snapshot");
    assert_eq!(market.pools[0].base_token, "SOL");
    assert_eq!(request.social.len(), 2);
    assert!(result
        .source_snapshot_ids
        .contains(&format!("market:{}", MARKET_SNAPSHOT_KEY)));
    assert!(result.source_snapshot_ids.contains(&fresh.url));
}

#[tokio::test]
async fn cold_start_generates_from_examples_only() {
    let h = default_harness().await;

    let result = h.engine.trigger_generation().await.unwrap();
    let request = h.generator.requests().await.pop().unwrap();

    assert!(request.is_cold());
    assert_eq!(request.examples, vec!["gm example".to_string()]);
    assert!(result.source_snapshot_ids.is_empty());
    assert_eq!(h.engine.get_stats().tweets_generated_total, 1);
}

#[tokio::test]
async fn consecutive_posts_do_not_reuse_articles_or_tokens() {
    let h = default_harness().await;
    h.refresh_round().await;

    h.engine.trigger_generation().await.unwrap();
    h.generator
        .set_reply("quiet weekend, memecoins drifting sideways")
        .await;
    h.engine.trigger_generation().await.unwrap();

    let seen = h.generator.requests().await;
    assert_eq!(seen[0].news.len(), 3);
    assert_eq!(seen[0].market.as_ref().map(|m| m.pools.len()), Some(1));
    assert!(seen[1].news.is_empty());
    assert!(seen[1].market.is_none());
    assert_eq!(seen[1].social.len(), 2);

    // SOL comes back once its mention window has passed.
    h.clock.advance(ChronoDuration::hours(25));
    h.generator
        .set_reply("fresh day, SOL liquidity is back on the menu")
        .await;
    h.engine.trigger_generation().await.unwrap();
    let last = h.generator.requests().await.pop().unwrap();
    assert_eq!(last.market.map(|m| m.pools[0].base_token.clone()), Some("SOL".to_string()));
    assert_eq!(h.publisher.live_posts().await.len(), 3);
}

#[tokio::test]
async fn generator_timeout_leaves_counters_untouched() {
    let h = harness(
        vec![],
        MockSummarizer::new(),
        MockGenerator::replying("too late").with_delay(Duration::from_secs(3)),
        MockPublisher::new(),
    )
    .await;

    let err = h.engine.trigger_generation().await.unwrap_err();

    assert!(matches!(err, BotError::GenerationTimeout(_)));
    assert_eq!(h.engine.coordinator().state(), GenerationState::Idle);
    assert_eq!(h.engine.coordinator().last_outcome(), GenerationState::Failed);
    assert_eq!(h.engine.get_stats().tweets_generated_total, 0);
    assert_eq!(h.engine.get_stats().last_generation_at, None);
    assert_eq!(h.publisher.attempts(), 0);
}

#[tokio::test]
async fn rate_limited_twice_then_success_posts_once() {
    let h = harness(
        vec![],
        MockSummarizer::new(),
        MockGenerator::replying("retry me"),
        MockPublisher::with_script(vec![
            MockPublishOutcome::Fail(BotError::RateLimited("429".into())),
            MockPublishOutcome::Fail(BotError::RateLimited("429".into())),
        ]),
    )
    .await;

    let result = h.engine.trigger_generation().await.unwrap();

    assert_eq!(result.post_id.as_deref(), Some("post-1"));
    assert_eq!(h.publisher.attempts(), 3);
    assert_eq!(h.publisher.live_posts().await, vec!["retry me".to_string()]);
    let stats = h.engine.get_stats();
    assert_eq!(stats.tweets_generated_total, 1);
    assert_eq!(stats.last_generation_at, Some(h.clock.now()));
}

#[tokio::test]
async fn one_summarization_failure_out_of_five() {
    let articles: Vec<RawArticle> = (0..5).map(sample_article).collect();
    let failing = articles[3].title.clone();
    let h = harness(
        articles,
        MockSummarizer::new().failing_on(&failing),
        MockGenerator::replying("unused"),
        MockPublisher::new(),
    )
    .await;

    h.refresh_round().await;

    assert_eq!(h.engine.get_stats().articles_processed_total, 4);
    assert_eq!(h.engine.caches().news.len().await, 4);
    assert!(!h.engine.caches().news.contains_key(&sample_article(3).url).await);
}

#[tokio::test]
async fn publish_failure_surfaces_and_keeps_stats() {
    let h = harness(
        vec![],
        MockSummarizer::new(),
        MockGenerator::replying("bad credentials"),
        MockPublisher::with_script(vec![MockPublishOutcome::Fail(BotError::AuthError(
            "401".into(),
        ))]),
    )
    .await;

    let err = h.engine.trigger_generation().await.unwrap_err();

    assert!(matches!(err, BotError::AuthError(_)));
    assert_eq!(h.publisher.attempts(), 1);
    assert_eq!(h.engine.get_stats().tweets_generated_total, 0);
    assert_eq!(h.engine.coordinator().state(), GenerationState::Idle);

    // The failed text was never recorded, so the same text may go out next time.
    let retry = h.engine.trigger_generation().await.unwrap();
    assert!(retry.confirmed);
}

#[tokio::test]
async fn ambiguous_publish_counts_once_and_is_not_retried() {
    let h = harness(
        vec![],
        MockSummarizer::new(),
        MockGenerator::replying("maybe posted"),
        MockPublisher::with_script(vec![MockPublishOutcome::AmbiguousPosted]),
    )
    .await;

    let result = h.engine.trigger_generation().await.unwrap();

    assert!(!result.confirmed);
    assert_eq!(result.post_id, None);
    assert_eq!(h.publisher.attempts(), 1);
    assert_eq!(h.publisher.live_posts().await.len(), 1);
    assert_eq!(h.engine.get_stats().tweets_generated_total, 1);
}

#[tokio::test]
async fn snapshot_tolerates_mixed_refresh_cycles() {
    let h = default_harness().await;
    h.refresh_round().await;

    // Social refreshes again with new posts; news and market are not yet due.
    h.clock.advance(ChronoDuration::minutes(61));
    h.social
        .set_posts("alice", vec![sample_post("alice", 2)])
        .await;
    h.market.set_failing(true);
    let dispatched = h.refresh_round().await;
    assert_eq!(dispatched, vec!["market", "social"]);

    h.engine.trigger_generation().await.unwrap();
    let request = h.generator.requests().await.pop().unwrap();
    let alice = request
        .social
        .iter()
        .find(|s| s.account == "alice")
        .unwrap();
    assert_eq!(alice.posts[0].id, sample_post("alice", 2).id);
    assert!(request.market.unwrap().fetched_at < alice.last_fetched_at);
    assert_eq!(request.news.len(), 3);
}
