// src/publisher.rs
//! Posting with bounded retry.
//!
//! Only failures that prove nothing was created (`RateLimited`, `NetworkError`) are retried.
//! An ambiguous outcome (`PostOutcomeUnknown`, or the per-attempt timeout elapsing after the
//! request went out) is reported as an unconfirmed success so a retry can never double-post.

use crate::config::Config;
use crate::error::{BotError, Result, RetryPolicy};
use crate::feeds::SocialPublisher;
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub post_id: Option<String>,
    pub attempts: u32,
    pub confirmed: bool,
}

pub struct Publisher {
    client: Arc<dyn SocialPublisher>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Publisher {
    pub fn new(
        client: Arc<dyn SocialPublisher>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            policy,
            attempt_timeout,
        }
    }

    pub fn from_config(client: Arc<dyn SocialPublisher>, config: &Config) -> Self {
        Self::new(
            client,
            RetryPolicy::new(
                config.publish_max_attempts,
                Duration::from_millis(config.publish_base_delay_ms),
                Duration::from_millis(config.publish_max_delay_ms),
            ),
            config.publish_timeout(),
        )
    }

    async fn attempt(&self, text: &str, attempt: u32) -> Result<Option<String>> {
        match tokio::time::timeout(self.attempt_timeout, self.client.post(text)).await {
            Ok(Ok(post_id)) => Ok(Some(post_id)),
            Ok(Err(BotError::PostOutcomeUnknown(reason))) => {
                warn!(
                    "Publish attempt {} outcome unknown ({}), not retrying",
                    attempt, reason
                );
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    "Publish attempt {} timed out after {:?}, outcome unknown",
                    attempt, self.attempt_timeout
                );
                Ok(None)
            }
        }
    }

    pub async fn publish(&self, text: &str) -> Result<PublishReceipt> {
        if text.trim().is_empty() {
            return Err(BotError::RejectedContent("empty post".to_string()));
        }

        let attempts = AtomicU32::new(0);
        let post_id = self
            .policy
            .execute(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.attempt(text, attempt)
            })
            .await?;

        let receipt = PublishReceipt {
            confirmed: post_id.is_some(),
            post_id,
            attempts: attempts.load(Ordering::SeqCst),
        };
        match &receipt.post_id {
            Some(id) => info!("Published post {} after {} attempt(s)", id, receipt.attempts),
            None => warn!("Publish unconfirmed after {} attempt(s)", receipt.attempts),
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPublishOutcome, MockPublisher};
    use pretty_assertions::assert_eq;

    fn publisher(mock: Arc<MockPublisher>, timeout: Duration) -> Publisher {
        Publisher::new(
            mock,
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4)),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let mock = Arc::new(MockPublisher::with_script(vec![
            MockPublishOutcome::Fail(BotError::RateLimited("429".into())),
            MockPublishOutcome::Fail(BotError::RateLimited("429".into())),
            MockPublishOutcome::Success,
        ]));
        let receipt = publisher(mock.clone(), Duration::from_secs(1))
            .publish("gm")
            .await
            .unwrap();

        assert_eq!(receipt.attempts, 3);
        assert!(receipt.confirmed);
        assert_eq!(mock.live_posts().await, vec!["gm".to_string()]);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let mock = Arc::new(MockPublisher::with_script(vec![MockPublishOutcome::Fail(
            BotError::AuthError("401".into()),
        )]));
        let err = publisher(mock.clone(), Duration::from_secs(1))
            .publish("gm")
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::AuthError(_)));
        assert_eq!(mock.attempts(), 1);
        assert!(mock.live_posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_outcome_is_unconfirmed_success() {
        let mock = Arc::new(MockPublisher::with_script(vec![
            MockPublishOutcome::AmbiguousPosted,
        ]));
        let receipt = publisher(mock.clone(), Duration::from_secs(1))
            .publish("gm")
            .await
            .unwrap();

        assert_eq!(
            receipt,
            PublishReceipt {
                post_id: None,
                attempts: 1,
                confirmed: false
            }
        );
        assert_eq!(mock.live_posts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_not_retried() {
        let mock = Arc::new(MockPublisher::with_script(vec![MockPublishOutcome::Hang(
            Duration::from_millis(200),
        )]));
        let receipt = publisher(mock.clone(), Duration::from_millis(20))
            .publish("gm")
            .await
            .unwrap();

        assert!(!receipt.confirmed);
        assert_eq!(mock.attempts(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surface_last_error() {
        let mock = Arc::new(MockPublisher::with_script(vec![
            MockPublishOutcome::Fail(BotError::NetworkError("refused".into())),
            MockPublishOutcome::Fail(BotError::NetworkError("refused".into())),
            MockPublishOutcome::Fail(BotError::RateLimited("429".into())),
        ]));
        let err = publisher(mock.clone(), Duration::from_secs(1))
            .publish("gm")
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::RateLimited(_)));
        assert_eq!(mock.attempts(), 3);
        assert!(mock.live_posts().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_rejected_locally() {
        let mock = Arc::new(MockPublisher::new());
        let err = publisher(mock.clone(), Duration::from_secs(1))
            .publish("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::RejectedContent(_)));
        assert_eq!(mock.attempts(), 0);
    }
}
