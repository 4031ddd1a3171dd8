// src/generation/request.rs
use crate::feeds::{MarketSnapshot, NewsItem, SocialSnapshot};
use crate::jobs::MARKET_SNAPSHOT_KEY;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Everything one generation run sees. Built once per trigger from cache snapshots; the
/// three signal groups may come from different refresh cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub id: Uuid,
    pub news: Vec<NewsItem>,
    pub social: Vec<SocialSnapshot>,
    pub market: Option<MarketSnapshot>,
    pub examples: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(
        news: Vec<NewsItem>,
        social: Vec<SocialSnapshot>,
        market: Option<MarketSnapshot>,
        examples: Vec<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            news,
            social,
            market,
            examples,
            requested_at,
        }
    }

    /// No news, no social posts and no market data: only the examples are left.
    pub fn is_cold(&self) -> bool {
        self.news.is_empty()
            && self.social.iter().all(|s| s.posts.is_empty())
            && self.market.as_ref().map_or(true, |m| m.pools.is_empty())
    }

    /// Cache keys that fed this request
    pub fn source_snapshot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.news.iter().map(|n| n.url.clone()).collect();
        ids.extend(self.social.iter().map(|s| format!("social:{}", s.account)));
        if self.market.is_some() {
            ids.push(format!("market:{}", MARKET_SNAPSHOT_KEY));
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub id: Uuid,
    pub text: String,
    pub generated_at: DateTime<Utc>,
    pub source_snapshot_ids: Vec<String>,
    /// `None` when the platform outcome could not be confirmed
    pub post_id: Option<String>,
    pub confirmed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_news_item, sample_pool, sample_post};

    #[test]
    fn test_cold_request() {
        let request = GenerationRequest::new(vec![], vec![], None, vec!["ex".into()], Utc::now());
        assert!(request.is_cold());
        assert!(request.source_snapshot_ids().is_empty());
    }

    #[test]
    fn test_source_ids_cover_every_signal() {
        let now = Utc::now();
        let request = GenerationRequest::new(
            vec![sample_news_item(1)],
            vec![SocialSnapshot {
                account: "alice".into(),
                posts: vec![sample_post("alice", 0)],
                last_fetched_at: now,
            }],
            Some(MarketSnapshot {
                fetched_at: now,
                pools: vec![sample_pool("SOL")],
            }),
            vec![],
            now,
        );

        assert!(!request.is_cold());
        assert_eq!(
            request.source_snapshot_ids(),
            vec![
                sample_news_item(1).url,
                "social:alice".to_string(),
                "market:trending".to_string()
            ]
        );
    }
}
