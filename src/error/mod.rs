use log::{debug, error, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// Network/parse failure while fetching signal data. Soft: previous cache value is kept.
    #[error("Fetch Error: {0}")]
    FetchError(String),

    /// Summarizer failed for one article. The article is dropped.
    #[error("Summarization Error: {0}")]
    SummarizationError(String),

    /// A generation run is already in flight
    #[error("Generation already in progress")]
    Busy,

    #[error("Generation Error: {0}")]
    GenerationError(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// Platform rate limit. No post was created.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Authentication Error: {0}")]
    AuthError(String),

    #[error("Content Rejected: {0}")]
    RejectedContent(String),

    /// Transport failure before the request reached the platform
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// The request may have been accepted; we cannot tell whether a post exists.
    #[error("Post outcome unknown: {0}")]
    PostOutcomeUnknown(String),

    /// Generated text is too close to something we published recently
    #[error("Duplicate Content: {0}")]
    DuplicateContent(String),

    #[error("Job already running: {0}")]
    JobAlreadyRunning(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Config Error: {0}")]
    ConfigError(String),

    #[error("Parse Error: {0}")]
    ParseError(String),
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::NetworkError(format!("HTTP client error: {}", err))
    }
}

impl BotError {
    /// Determines if the failure can clear up on its own (later run, later attempt)
    pub fn is_recoverable(&self) -> bool {
        match self {
            BotError::FetchError(_) => true,
            BotError::SummarizationError(_) => true,
            BotError::Busy => true,
            BotError::GenerationError(_) => true,
            BotError::GenerationTimeout(_) => true,
            BotError::RateLimited(_) => true,
            BotError::AuthError(_) => false, // Credentials need fixing
            BotError::RejectedContent(_) => false, // Same text will be rejected again
            BotError::NetworkError(_) => true,
            BotError::PostOutcomeUnknown(_) => false, // Retrying could double-post
            BotError::DuplicateContent(_) => true, // Fresh signals produce different text
            BotError::JobAlreadyRunning(_) => true,
            BotError::UnknownJob(_) => false,
            BotError::ConfigError(_) => false,
            BotError::ParseError(_) => false,
        }
    }

    /// Determines if an operation should be retried immediately (with backoff).
    /// Only errors that prove no side effect happened qualify.
    pub fn should_retry(&self) -> bool {
        self.is_recoverable()
            && matches!(self, BotError::RateLimited(_) | BotError::NetworkError(_))
    }

    /// Soft failures degrade freshness but never abort the owning operation
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            BotError::FetchError(_) | BotError::SummarizationError(_)
        )
    }

    /// Categorizes error for logging and stats
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            BotError::FetchError(_) | BotError::SummarizationError(_) => ErrorCategory::DataFeed,
            BotError::Busy | BotError::JobAlreadyRunning(_) => ErrorCategory::Concurrency,
            BotError::GenerationError(_)
            | BotError::GenerationTimeout(_)
            | BotError::DuplicateContent(_) => ErrorCategory::Generation,
            BotError::RateLimited(_)
            | BotError::RejectedContent(_)
            | BotError::PostOutcomeUnknown(_) => ErrorCategory::Publishing,
            BotError::NetworkError(_) => ErrorCategory::Network,
            BotError::AuthError(_) | BotError::ConfigError(_) | BotError::UnknownJob(_) => {
                ErrorCategory::Configuration
            }
            BotError::ParseError(_) => ErrorCategory::Data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    DataFeed,
    Concurrency,
    Generation,
    Publishing,
    Network,
    Configuration,
    Data,
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Calculate delay for a given attempt (exponential backoff)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let factor = 2_u128.saturating_pow(attempt - 1);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let delay = Duration::from_millis(delay_ms.min(self.max_delay.as_millis()) as u64);

        debug!("Retry attempt {}: delay = {:?}", attempt, delay);
        delay
    }

    /// Execute operation with retry logic. Only errors whose `should_retry` holds
    /// are retried; everything else is returned on the spot.
    pub async fn execute<F, T, E, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: Into<BotError>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_for_attempt(attempt);
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let bot_error: BotError = e.into();

                    if !bot_error.should_retry() {
                        warn!(
                            "Non-retryable error on attempt {}: {}",
                            attempt + 1,
                            bot_error
                        );
                        return Err(bot_error);
                    }

                    warn!(
                        "Attempt {}/{} failed: {} (retrying...)",
                        attempt + 1,
                        self.max_attempts,
                        bot_error
                    );
                    last_error = Some(bot_error);
                }
            }
        }

        error!("All {} retry attempts failed", self.max_attempts);
        Err(last_error
            .unwrap_or_else(|| BotError::NetworkError("Max retries exceeded".to_string())))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(60))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(350));
    }

    #[test]
    fn test_only_side_effect_free_errors_retry() {
        assert!(BotError::RateLimited("429".into()).should_retry());
        assert!(BotError::NetworkError("connect".into()).should_retry());
        assert!(!BotError::AuthError("401".into()).should_retry());
        assert!(!BotError::RejectedContent("dup".into()).should_retry());
        assert!(!BotError::PostOutcomeUnknown("timeout".into()).should_retry());
        assert!(!BotError::FetchError("x".into()).should_retry());
    }

    #[test]
    fn test_soft_errors() {
        assert!(BotError::FetchError("x".into()).is_soft());
        assert!(BotError::SummarizationError("x".into()).is_soft());
        assert!(!BotError::Busy.is_soft());
        assert_eq!(BotError::Busy.categorize(), ErrorCategory::Concurrency);
    }

    #[tokio::test]
    async fn test_execute_retries_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(BotError::RateLimited("slow down".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_stops_on_permanent_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<()> = policy
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(BotError::AuthError("bad token".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(BotError::AuthError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
