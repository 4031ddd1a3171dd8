// src/clients/mod.rs
//! HTTP implementations of the collaborator traits.

pub mod anthropic;
pub mod gecko_terminal;
pub mod http;
pub mod rss;
pub mod twitter;

pub use anthropic::AnthropicClient;
pub use gecko_terminal::GeckoTerminalClient;
pub use http::build_http_client;
pub use self::rss::RssNewsFetcher;
pub use twitter::TwitterClient;

use crate::config::Config;
use crate::engine::Collaborators;
use crate::error::{BotError, Result};
use log::warn;
use std::sync::Arc;

/// Builds every production collaborator on one shared HTTP client.
pub fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let http = build_http_client(config.http_timeout())?;

    let api_key = config
        .anthropic_api_key
        .as_deref()
        .ok_or_else(|| BotError::ConfigError("ANTHROPIC_API_KEY is required".to_string()))?;
    let anthropic = Arc::new(AnthropicClient::new(
        http.clone(),
        &config.anthropic_api_url,
        api_key,
        &config.anthropic_model,
        config.anthropic_max_tokens,
    ));

    if config.twitter_bearer_token.is_none() {
        warn!("BEARER_TOKEN not set: social refreshes will fail softly");
    }
    if config.twitter_user_access_token.is_none() {
        warn!("TWITTER_USER_ACCESS_TOKEN not set: publishing will fail with an auth error");
    }
    let twitter = Arc::new(TwitterClient::new(
        http.clone(),
        &config.twitter_api_url,
        config.twitter_bearer_token.clone(),
        config.twitter_user_access_token.clone(),
    ));

    Ok(Collaborators {
        news_fetcher: Arc::new(RssNewsFetcher::new(http.clone(), &config.rss_feed_url)),
        summarizer: anthropic.clone(),
        social_fetcher: twitter.clone(),
        market_fetcher: Arc::new(GeckoTerminalClient::new(
            http,
            &config.gecko_terminal_api_url,
            config.min_pool_volume_24h_usd,
            config.min_pool_liquidity_usd,
        )),
        generator: anthropic,
        publisher: twitter,
    })
}
