//! Test doubles and sample data shared by unit tests and the `tests/` scenarios.

pub mod mocks;

pub use mocks::{
    MockGenerator, MockMarketFetcher, MockNewsFetcher, MockPublishOutcome, MockPublisher,
    MockSocialFetcher, MockSummarizer,
};

use crate::feeds::{NewsItem, RawArticle, SocialPost, TrendingPool};

/// Installs a test logger once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sample_article(i: usize) -> RawArticle {
    RawArticle {
        url: format!("https://news.example.com/articles/{}", i),
        title: format!("Headline number {}", i),
        raw_body: format!("Body of article {} about on-chain activity.", i),
        published_at: None,
    }
}

pub fn sample_news_item(i: usize) -> NewsItem {
    let article = sample_article(i);
    let summary = format!("Summary: {}", article.title);
    NewsItem::from_article(article, summary)
}

pub fn sample_post(account: &str, i: usize) -> SocialPost {
    SocialPost {
        id: format!("{}-{}", account, i),
        account: account.to_string(),
        text: format!("post {} from @{}", i, account),
        created_at: None,
        like_count: (i as u64) * 10,
        repost_count: i as u64,
    }
}

pub fn sample_pool(base: &str) -> TrendingPool {
    TrendingPool {
        name: format!("{} / USDC", base),
        base_token: base.to_string(),
        quote_token: "USDC".to_string(),
        price_change_24h_pct: 4.5,
        volume_24h_usd: 2_500_000.0,
        liquidity_usd: 800_000.0,
        market_cap_usd: Some(90_000_000.0),
        buys_24h: 1200,
        sells_24h: 800,
    }
}
