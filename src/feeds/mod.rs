// src/feeds/mod.rs
//! Collaborator seams. The engine only talks to the outside world through these traits;
//! concrete HTTP implementations live in `crate::clients`, test doubles in `crate::testing`.

pub mod types;

pub use types::{MarketSnapshot, NewsItem, RawArticle, SocialPost, SocialSnapshot, TrendingPool};

use crate::error::Result;
use crate::generation::GenerationRequest;
use async_trait::async_trait;

#[async_trait]
pub trait NewsFetcher: Send + Sync {
    /// Latest articles from the news source. Fails with `FetchError`.
    async fn fetch(&self) -> Result<Vec<RawArticle>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Fails with `SummarizationError`.
    async fn summarize(&self, title: &str, raw_body: &str) -> Result<String>;
}

#[async_trait]
pub trait SocialFetcher: Send + Sync {
    /// Recent posts of `account`, newest first. Fails with `FetchError`.
    async fn fetch_account(&self, account: &str) -> Result<Vec<SocialPost>>;
}

#[async_trait]
pub trait MarketFetcher: Send + Sync {
    async fn fetch_trending_pools(&self) -> Result<Vec<TrendingPool>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Posting side of the social platform.
///
/// Implementations must classify failures precisely: `RateLimited` and `NetworkError` mean no
/// post was created and are retried; `PostOutcomeUnknown` means the request may have landed and
/// is never retried.
#[async_trait]
pub trait SocialPublisher: Send + Sync {
    /// Returns the id of the created post.
    async fn post(&self, text: &str) -> Result<String>;
}
