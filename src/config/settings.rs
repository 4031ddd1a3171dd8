use crate::error::{BotError, Result};
use chrono::Duration as ChronoDuration;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Upper bound for every hour-based window setting (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Accounts whose timelines feed the social cache when MONITORED_ACCOUNTS is unset.
pub const DEFAULT_MONITORED_ACCOUNTS: &[&str] = &[
    "MorpheusAIs",
    "ErikVoorhees",
    "pmarca",
    "CryptoGodJohn",
    "cdixon",
];

#[derive(Clone)]
pub struct Config {
    // Scheduler cadence
    pub scheduler_tick_secs: u64,
    pub news_refresh_interval_secs: u64,
    pub social_refresh_interval_secs: u64,
    pub market_refresh_interval_secs: u64,

    // Caches
    pub news_cache_capacity: usize,
    pub news_cache_ttl_secs: u64,
    pub social_cache_ttl_secs: u64,
    pub market_cache_ttl_secs: u64,
    pub social_max_posts_per_account: usize,
    pub news_max_age_hours: i64,
    pub news_max_summaries_per_run: usize,
    pub monitored_accounts: Vec<String>,

    // Collaborator timeouts
    pub fetch_timeout_secs: u64,
    pub summarize_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    pub http_timeout_secs: u64,

    // Publishing
    pub publish_max_attempts: u32,
    pub publish_base_delay_ms: u64,
    pub publish_max_delay_ms: u64,
    pub duplicate_similarity_threshold: f64,
    pub duplicate_window_hours: i64,
    pub article_reuse_window_hours: i64,
    pub token_reuse_window_hours: i64,

    // Generation input
    pub max_news_per_request: usize,
    pub max_pools_per_request: usize,
    pub example_tweets_path: String,

    // Endpoints & credentials
    pub rss_feed_url: String,
    pub gecko_terminal_api_url: String,
    pub min_pool_volume_24h_usd: f64,
    pub min_pool_liquidity_usd: f64,
    pub anthropic_api_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_max_tokens: u32,
    pub twitter_api_url: String,
    pub twitter_bearer_token: Option<String>,
    pub twitter_user_access_token: Option<String>,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler_tick_secs: 60,
            news_refresh_interval_secs: 12 * 60 * 60,
            social_refresh_interval_secs: 60 * 60,
            market_refresh_interval_secs: 15 * 60,
            news_cache_capacity: 200,
            news_cache_ttl_secs: 48 * 60 * 60,
            social_cache_ttl_secs: 2 * 60 * 60,
            market_cache_ttl_secs: 30 * 60,
            social_max_posts_per_account: 10,
            news_max_age_hours: 24,
            news_max_summaries_per_run: 20,
            monitored_accounts: DEFAULT_MONITORED_ACCOUNTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fetch_timeout_secs: 30,
            summarize_timeout_secs: 60,
            generation_timeout_secs: 90,
            publish_timeout_secs: 30,
            http_timeout_secs: 30,
            publish_max_attempts: 3,
            publish_base_delay_ms: 2_000,
            publish_max_delay_ms: 60_000,
            duplicate_similarity_threshold: 0.7,
            duplicate_window_hours: 48,
            article_reuse_window_hours: 48,
            token_reuse_window_hours: 24,
            max_news_per_request: 5,
            max_pools_per_request: 5,
            example_tweets_path: "tweets_config.json".to_string(),
            rss_feed_url: "https://cointelegraph.com/rss".to_string(),
            gecko_terminal_api_url: "https://api.geckoterminal.com/api/v2".to_string(),
            min_pool_volume_24h_usd: 100_000.0,
            min_pool_liquidity_usd: 50_000.0,
            anthropic_api_url: "https://api.anthropic.com/v1/messages".to_string(),
            anthropic_api_key: None,
            anthropic_model: "claude-3-opus-20240229".to_string(),
            anthropic_max_tokens: 2048,
            twitter_api_url: "https://api.twitter.com/2".to_string(),
            twitter_bearer_token: None,
            twitter_user_access_token: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let d = Config::default();
        Config {
            scheduler_tick_secs: parse_env("SCHEDULER_TICK_SECS").unwrap_or(d.scheduler_tick_secs),
            news_refresh_interval_secs: parse_env("NEWS_REFRESH_INTERVAL_SECS")
                .unwrap_or(d.news_refresh_interval_secs),
            social_refresh_interval_secs: parse_env("SOCIAL_REFRESH_INTERVAL_SECS")
                .unwrap_or(d.social_refresh_interval_secs),
            market_refresh_interval_secs: parse_env("MARKET_REFRESH_INTERVAL_SECS")
                .unwrap_or(d.market_refresh_interval_secs),
            news_cache_capacity: parse_env("NEWS_CACHE_CAPACITY").unwrap_or(d.news_cache_capacity),
            news_cache_ttl_secs: parse_env("NEWS_CACHE_TTL_SECS").unwrap_or(d.news_cache_ttl_secs),
            social_cache_ttl_secs: parse_env("SOCIAL_CACHE_TTL_SECS")
                .unwrap_or(d.social_cache_ttl_secs),
            market_cache_ttl_secs: parse_env("MARKET_CACHE_TTL_SECS")
                .unwrap_or(d.market_cache_ttl_secs),
            social_max_posts_per_account: parse_env("SOCIAL_MAX_POSTS_PER_ACCOUNT")
                .unwrap_or(d.social_max_posts_per_account),
            news_max_age_hours: parse_env("NEWS_MAX_AGE_HOURS").unwrap_or(d.news_max_age_hours),
            news_max_summaries_per_run: parse_env("NEWS_MAX_SUMMARIES_PER_RUN")
                .unwrap_or(d.news_max_summaries_per_run),
            monitored_accounts: env::var("MONITORED_ACCOUNTS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|a| a.trim().trim_start_matches('@').to_string())
                        .filter(|a| !a.is_empty())
                        .collect()
                })
                .unwrap_or(d.monitored_accounts),
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS").unwrap_or(d.fetch_timeout_secs),
            summarize_timeout_secs: parse_env("SUMMARIZE_TIMEOUT_SECS")
                .unwrap_or(d.summarize_timeout_secs),
            generation_timeout_secs: parse_env("GENERATION_TIMEOUT_SECS")
                .unwrap_or(d.generation_timeout_secs),
            publish_timeout_secs: parse_env("PUBLISH_TIMEOUT_SECS")
                .unwrap_or(d.publish_timeout_secs),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS").unwrap_or(d.http_timeout_secs),
            publish_max_attempts: parse_env("PUBLISH_MAX_ATTEMPTS")
                .unwrap_or(d.publish_max_attempts),
            publish_base_delay_ms: parse_env("PUBLISH_BASE_DELAY_MS")
                .unwrap_or(d.publish_base_delay_ms),
            publish_max_delay_ms: parse_env("PUBLISH_MAX_DELAY_MS")
                .unwrap_or(d.publish_max_delay_ms),
            duplicate_similarity_threshold: parse_env("DUPLICATE_SIMILARITY_THRESHOLD")
                .unwrap_or(d.duplicate_similarity_threshold),
            duplicate_window_hours: parse_env("DUPLICATE_WINDOW_HOURS")
                .unwrap_or(d.duplicate_window_hours),
            article_reuse_window_hours: parse_env("ARTICLE_REUSE_WINDOW_HOURS")
                .unwrap_or(d.article_reuse_window_hours),
            token_reuse_window_hours: parse_env("TOKEN_REUSE_WINDOW_HOURS")
                .unwrap_or(d.token_reuse_window_hours),
            max_news_per_request: parse_env("MAX_NEWS_PER_REQUEST")
                .unwrap_or(d.max_news_per_request),
            max_pools_per_request: parse_env("MAX_POOLS_PER_REQUEST")
                .unwrap_or(d.max_pools_per_request),
            example_tweets_path: non_empty_env("EXAMPLE_TWEETS_PATH")
                .unwrap_or(d.example_tweets_path),
            rss_feed_url: non_empty_env("RSS_FEED_URL").unwrap_or(d.rss_feed_url),
            gecko_terminal_api_url: non_empty_env("GECKO_TERMINAL_API_URL")
                .unwrap_or(d.gecko_terminal_api_url),
            min_pool_volume_24h_usd: parse_env("MIN_POOL_VOLUME_24H_USD")
                .unwrap_or(d.min_pool_volume_24h_usd),
            min_pool_liquidity_usd: parse_env("MIN_POOL_LIQUIDITY_USD")
                .unwrap_or(d.min_pool_liquidity_usd),
            anthropic_api_url: non_empty_env("ANTHROPIC_API_URL").unwrap_or(d.anthropic_api_url),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            anthropic_model: non_empty_env("ANTHROPIC_MODEL").unwrap_or(d.anthropic_model),
            anthropic_max_tokens: parse_env("ANTHROPIC_MAX_TOKENS")
                .unwrap_or(d.anthropic_max_tokens),
            twitter_api_url: non_empty_env("TWITTER_API_URL").unwrap_or(d.twitter_api_url),
            twitter_bearer_token: non_empty_env("BEARER_TOKEN"),
            twitter_user_access_token: non_empty_env("TWITTER_USER_ACCESS_TOKEN"),
            log_level: non_empty_env("LOG_LEVEL").unwrap_or(d.log_level),
        }
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("SCHEDULER_TICK_SECS", self.scheduler_tick_secs),
            ("NEWS_REFRESH_INTERVAL_SECS", self.news_refresh_interval_secs),
            ("SOCIAL_REFRESH_INTERVAL_SECS", self.social_refresh_interval_secs),
            ("MARKET_REFRESH_INTERVAL_SECS", self.market_refresh_interval_secs),
            ("NEWS_CACHE_TTL_SECS", self.news_cache_ttl_secs),
            ("SOCIAL_CACHE_TTL_SECS", self.social_cache_ttl_secs),
            ("MARKET_CACHE_TTL_SECS", self.market_cache_ttl_secs),
            ("FETCH_TIMEOUT_SECS", self.fetch_timeout_secs),
            ("GENERATION_TIMEOUT_SECS", self.generation_timeout_secs),
            ("PUBLISH_TIMEOUT_SECS", self.publish_timeout_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(BotError::ConfigError(format!("{} must be greater than 0", name)));
            }
        }
        if self.news_cache_capacity == 0 {
            return Err(BotError::ConfigError(
                "NEWS_CACHE_CAPACITY must be greater than 0".to_string(),
            ));
        }
        if self.monitored_accounts.is_empty() {
            return Err(BotError::ConfigError(
                "MONITORED_ACCOUNTS must name at least one account".to_string(),
            ));
        }
        if self.publish_max_attempts == 0 {
            return Err(BotError::ConfigError(
                "PUBLISH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.duplicate_similarity_threshold) {
            return Err(BotError::ConfigError(
                "DUPLICATE_SIMILARITY_THRESHOLD must be within [0, 1]".to_string(),
            ));
        }
        // A fetch that can outlive its own cadence would always be skipped as in-flight.
        let shortest_interval = self
            .news_refresh_interval_secs
            .min(self.social_refresh_interval_secs)
            .min(self.market_refresh_interval_secs);
        if self.fetch_timeout_secs >= shortest_interval {
            return Err(BotError::ConfigError(format!(
                "FETCH_TIMEOUT_SECS ({}) must be shorter than the shortest refresh interval ({}s)",
                self.fetch_timeout_secs, shortest_interval
            )));
        }
        let windows = [
            ("NEWS_MAX_AGE_HOURS", self.news_max_age_hours),
            ("DUPLICATE_WINDOW_HOURS", self.duplicate_window_hours),
            ("ARTICLE_REUSE_WINDOW_HOURS", self.article_reuse_window_hours),
            ("TOKEN_REUSE_WINDOW_HOURS", self.token_reuse_window_hours),
        ];
        for (name, hours) in windows {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(BotError::ConfigError(format!(
                    "{} must be between 1 and {} (got {})",
                    name, MAX_WINDOW_HOURS, hours
                )));
            }
        }
        let endpoints = [
            ("RSS_FEED_URL", &self.rss_feed_url),
            ("GECKO_TERMINAL_API_URL", &self.gecko_terminal_api_url),
            ("ANTHROPIC_API_URL", &self.anthropic_api_url),
            ("TWITTER_API_URL", &self.twitter_api_url),
        ];
        for (name, value) in endpoints {
            Url::parse(value).map_err(|e| {
                BotError::ConfigError(format!("{} is not a valid URL: {}", name, e))
            })?;
        }
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.anthropic_api_key.is_none() {
            log::warn!("ANTHROPIC_API_KEY is not set; summaries and generation will fail");
        }
        if self.twitter_user_access_token.is_none() {
            log::warn!("TWITTER_USER_ACCESS_TOKEN is not set; publishing will fail");
        }
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn news_max_age(&self) -> ChronoDuration {
        window_hours(self.news_max_age_hours)
    }

    pub fn duplicate_window(&self) -> ChronoDuration {
        window_hours(self.duplicate_window_hours)
    }

    pub fn article_reuse_window(&self) -> ChronoDuration {
        window_hours(self.article_reuse_window_hours)
    }

    pub fn token_reuse_window(&self) -> ChronoDuration {
        window_hours(self.token_reuse_window_hours)
    }
}

/// Hours clamped into `1..=MAX_WINDOW_HOURS`.
fn window_hours(hours: i64) -> ChronoDuration {
    ChronoDuration::hours(hours.clamp(1, MAX_WINDOW_HOURS))
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

// Manual Debug so credentials never reach the log
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("scheduler_tick_secs", &self.scheduler_tick_secs)
            .field("news_refresh_interval_secs", &self.news_refresh_interval_secs)
            .field("social_refresh_interval_secs", &self.social_refresh_interval_secs)
            .field("market_refresh_interval_secs", &self.market_refresh_interval_secs)
            .field("news_cache_capacity", &self.news_cache_capacity)
            .field("news_cache_ttl_secs", &self.news_cache_ttl_secs)
            .field("social_cache_ttl_secs", &self.social_cache_ttl_secs)
            .field("market_cache_ttl_secs", &self.market_cache_ttl_secs)
            .field("monitored_accounts", &self.monitored_accounts)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("publish_max_attempts", &self.publish_max_attempts)
            .field("news_max_age_hours", &self.news_max_age_hours)
            .field("duplicate_window_hours", &self.duplicate_window_hours)
            .field("article_reuse_window_hours", &self.article_reuse_window_hours)
            .field("token_reuse_window_hours", &self.token_reuse_window_hours)
            .field("rss_feed_url", &self.rss_feed_url)
            .field("gecko_terminal_api_url", &self.gecko_terminal_api_url)
            .field("anthropic_model", &self.anthropic_model)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("twitter_bearer_token", &redact(&self.twitter_bearer_token))
            .field(
                "twitter_user_access_token",
                &redact(&self.twitter_user_access_token),
            )
            .field("example_tweets_path", &self.example_tweets_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}
