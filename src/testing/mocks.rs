// src/testing/mocks.rs
//! Scriptable in-memory collaborators.

use crate::error::{BotError, Result};
use crate::feeds::{
    Generator, MarketFetcher, NewsFetcher, RawArticle, SocialFetcher, SocialPost,
    SocialPublisher, Summarizer, TrendingPool,
};
use crate::generation::GenerationRequest;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

pub struct MockNewsFetcher {
    articles: Mutex<Vec<RawArticle>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockNewsFetcher {
    pub fn new(articles: Vec<RawArticle>) -> Self {
        Self {
            articles: Mutex::new(articles),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_articles(&self, articles: Vec<RawArticle>) {
        *self.articles.lock().await = articles;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsFetcher for MockNewsFetcher {
    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::FetchError("mock news feed unavailable".into()));
        }
        Ok(self.articles.lock().await.clone())
    }
}

/// Summary is `"Summary: <title>"`; titles registered with `failing_on` fail.
pub struct MockSummarizer {
    fail_titles: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            fail_titles: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, title: &str) -> Self {
        self.fail_titles.get_mut().insert(title.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, title: &str, _raw_body: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_titles.lock().await.contains(title) {
            return Err(BotError::SummarizationError(format!(
                "mock refused '{}'",
                title
            )));
        }
        Ok(format!("Summary: {}", title))
    }
}

#[derive(Default)]
pub struct MockSocialFetcher {
    posts: Mutex<HashMap<String, Vec<SocialPost>>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockSocialFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_posts(&self, account: &str, posts: Vec<SocialPost>) {
        self.posts.lock().await.insert(account.to_string(), posts);
    }

    pub async fn fail_account(&self, account: &str) {
        self.failing.lock().await.insert(account.to_string());
    }

    pub async fn recover_account(&self, account: &str) {
        self.failing.lock().await.remove(account);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialFetcher for MockSocialFetcher {
    async fn fetch_account(&self, account: &str) -> Result<Vec<SocialPost>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().await.contains(account) {
            return Err(BotError::FetchError(format!("mock timeline for @{} failed", account)));
        }
        Ok(self
            .posts
            .lock()
            .await
            .get(account)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct MockMarketFetcher {
    pools: Mutex<Vec<TrendingPool>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockMarketFetcher {
    pub fn new(pools: Vec<TrendingPool>) -> Self {
        Self {
            pools: Mutex::new(pools),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_pools(&self, pools: Vec<TrendingPool>) {
        *self.pools.lock().await = pools;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketFetcher for MockMarketFetcher {
    async fn fetch_trending_pools(&self) -> Result<Vec<TrendingPool>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::FetchError("mock market API unavailable".into()));
        }
        Ok(self.pools.lock().await.clone())
    }
}

/// Replies with a fixed text. Can be slowed down, made to fail, or held until released.
pub struct MockGenerator {
    reply: Mutex<String>,
    delay: Duration,
    failing: AtomicBool,
    gate: Option<Notify>,
    started: Notify,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(text.to_string()),
            delay: Duration::ZERO,
            failing: AtomicBool::new(false),
            gate: None,
            started: Notify::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call blocks until [`MockGenerator::release`].
    pub fn held(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Resolves once a `generate` call has begun.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub async fn set_reply(&self, text: &str) {
        *self.reply.lock().await = text.to_string();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::NetworkError("mock model endpoint down".into()));
        }
        Ok(self.reply.lock().await.clone())
    }
}

/// One scripted `post` outcome
#[derive(Debug, Clone)]
pub enum MockPublishOutcome {
    Success,
    Fail(BotError),
    /// The post goes live but the caller sees `PostOutcomeUnknown`
    AmbiguousPosted,
    /// Sleeps before succeeding
    Hang(Duration),
}

/// Plays a script of outcomes, then succeeds. `live_posts` is what actually went live.
#[derive(Default)]
pub struct MockPublisher {
    script: Mutex<VecDeque<MockPublishOutcome>>,
    live: Mutex<Vec<String>>,
    attempts: AtomicUsize,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<MockPublishOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub async fn push_outcome(&self, outcome: MockPublishOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn live_posts(&self) -> Vec<String> {
        self.live.lock().await.clone()
    }

    async fn go_live(&self, text: &str) -> String {
        let mut live = self.live.lock().await;
        live.push(text.to_string());
        format!("post-{}", live.len())
    }
}

#[async_trait]
impl SocialPublisher for MockPublisher {
    async fn post(&self, text: &str) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(MockPublishOutcome::Success);

        match outcome {
            MockPublishOutcome::Success => Ok(self.go_live(text).await),
            MockPublishOutcome::Fail(e) => Err(e),
            MockPublishOutcome::AmbiguousPosted => {
                self.go_live(text).await;
                Err(BotError::PostOutcomeUnknown("mock connection dropped".into()))
            }
            MockPublishOutcome::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.go_live(text).await)
            }
        }
    }
}
