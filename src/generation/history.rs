// src/generation/history.rs
use crate::error::{BotError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::info;
use std::collections::{HashSet, VecDeque};
use tokio::sync::Mutex;

const MAX_REMEMBERED_POSTS: usize = 200;

#[derive(Debug, Clone)]
struct PublishedPost {
    text: String,
    published_at: DateTime<Utc>,
}

/// Recently published texts, used to refuse near-duplicates before they reach the platform.
pub struct RecentPosts {
    posts: Mutex<VecDeque<PublishedPost>>,
    window: ChronoDuration,
    threshold: f64,
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// Jaccard similarity of the lowercase word sets of `a` and `b`
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left = word_set(a);
    let right = word_set(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

impl RecentPosts {
    pub fn new(window: ChronoDuration, threshold: f64) -> Self {
        Self {
            posts: Mutex::new(VecDeque::new()),
            window,
            threshold,
        }
    }

    /// `DuplicateContent` if `text` is more similar than the threshold to any post
    /// published within the window.
    pub async fn check(&self, text: &str, now: DateTime<Utc>) -> Result<()> {
        let cutoff = now - self.window;
        let posts = self.posts.lock().await;

        for post in posts.iter().filter(|p| p.published_at >= cutoff) {
            let similarity = jaccard_similarity(text, &post.text);
            if similarity > self.threshold {
                info!("Generated text similar to a recent post (similarity: {:.2})", similarity);
                return Err(BotError::DuplicateContent(format!(
                    "similarity {:.2} with post from {}",
                    similarity,
                    post.published_at.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    pub async fn record(&self, text: &str, published_at: DateTime<Utc>) {
        let cutoff = published_at - self.window;
        let mut posts = self.posts.lock().await;
        posts.retain(|p| p.published_at >= cutoff);
        posts.push_back(PublishedPost {
            text: text.to_string(),
            published_at,
        });
        while posts.len() > MAX_REMEMBERED_POSTS {
            posts.pop_front();
        }
    }

    pub async fn len(&self) -> usize {
        self.posts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
