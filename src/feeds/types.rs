// src/feeds/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article as delivered by the news source, before summarization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    pub raw_body: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Summarized article, keyed by `url` in the news cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub url: String,
    pub title: String,
    pub raw_body: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn from_article(article: RawArticle, summary: String) -> Self {
        Self {
            url: article.url,
            title: article.title,
            raw_body: article.raw_body,
            summary,
            published_at: article.published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub account: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: u64,
    pub repost_count: u64,
}

/// Latest posts of one monitored account, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSnapshot {
    pub account: String,
    pub posts: Vec<SocialPost>,
    pub last_fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingPool {
    pub name: String,
    pub base_token: String,
    pub quote_token: String,
    pub price_change_24h_pct: f64,
    pub volume_24h_usd: f64,
    pub liquidity_usd: f64,
    pub market_cap_usd: Option<f64>,
    pub buys_24h: u64,
    pub sells_24h: u64,
}

impl TrendingPool {
    /// Buys per sell over 24h. `None` when nothing was sold.
    pub fn buy_sell_ratio(&self) -> Option<f64> {
        if self.sells_24h == 0 {
            None
        } else {
            Some(self.buys_24h as f64 / self.sells_24h as f64)
        }
    }
}

/// Global trending-pool view, replaced wholesale on every successful market refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub pools: Vec<TrendingPool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn pool(buys: u64, sells: u64) -> TrendingPool {
        TrendingPool {
            name: "SOL / USDC".into(),
            base_token: "SOL".into(),
            quote_token: "USDC".into(),
            price_change_24h_pct: 3.2,
            volume_24h_usd: 1_000_000.0,
            liquidity_usd: 500_000.0,
            market_cap_usd: None,
            buys_24h: buys,
            sells_24h: sells,
        }
    }

    #[test]
    fn test_buy_sell_ratio() {
        assert_approx_eq!(pool(300, 200).buy_sell_ratio().unwrap(), 1.5);
        assert_eq!(pool(10, 0).buy_sell_ratio(), None);
    }
}
