// src/clients/twitter.rs
//! Twitter API v2: timeline reads with the app bearer token, posting with a user-context
//! access token.

use super::http::describe_error_response;
use crate::error::{BotError, Result};
use crate::feeds::{SocialFetcher, SocialPost, SocialPublisher};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const TIMELINE_MAX_RESULTS: &str = "10";

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<TweetData>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    created_at: Option<DateTime<Utc>>,
    in_reply_to_user_id: Option<String>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: Option<CreatedTweet>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

pub struct TwitterClient {
    client: Client,
    api_url: String,
    bearer_token: Option<String>,
    user_access_token: Option<String>,
    user_ids: DashMap<String, String>,
}

/// Timeline JSON to posts, newest first, replies dropped
pub fn parse_timeline(account: &str, body: &str) -> Result<Vec<SocialPost>> {
    let timeline: TimelineResponse = serde_json::from_str(body)?;
    let mut posts: Vec<SocialPost> = timeline
        .data
        .into_iter()
        .filter(|tweet| tweet.in_reply_to_user_id.is_none())
        .map(|tweet| {
            let metrics = tweet.public_metrics.unwrap_or_default();
            SocialPost {
                id: tweet.id,
                account: account.to_string(),
                text: tweet.text,
                created_at: tweet.created_at,
                like_count: metrics.like_count,
                repost_count: metrics.retweet_count,
            }
        })
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

/// Maps a non-success `POST /tweets` status. 5xx is ambiguous: the post may exist.
pub fn classify_post_status(status: StatusCode, detail: String) -> BotError {
    match status.as_u16() {
        429 => BotError::RateLimited(detail),
        401 | 403 => BotError::AuthError(detail),
        400 | 422 => BotError::RejectedContent(detail),
        500..=599 => BotError::PostOutcomeUnknown(detail),
        _ => BotError::RejectedContent(detail),
    }
}

/// Transport failure on `POST /tweets`. Only a failed connect proves nothing was sent.
pub fn classify_send_error(err: &reqwest::Error) -> BotError {
    if err.is_connect() || err.is_builder() {
        BotError::NetworkError(format!("Tweet not sent: {}", err))
    } else if err.is_timeout() {
        BotError::PostOutcomeUnknown(format!("Tweet request timed out: {}", err))
    } else {
        BotError::PostOutcomeUnknown(format!("Tweet request interrupted: {}", err))
    }
}

impl TwitterClient {
    pub fn new(
        client: Client,
        api_url: &str,
        bearer_token: Option<String>,
        user_access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bearer_token,
            user_access_token,
            user_ids: DashMap::new(),
        }
    }

    fn bearer(&self) -> Result<&str> {
        self.bearer_token
            .as_deref()
            .ok_or_else(|| BotError::FetchError("BEARER_TOKEN is not set".to_string()))
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.bearer()?)
            .query(query)
            .send()
            .await
            .map_err(|e| BotError::FetchError(format!("Twitter request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::FetchError(format!(
                "Twitter API error {}",
                describe_error_response(response).await
            )));
        }
        response
            .text()
            .await
            .map_err(|e| BotError::FetchError(format!("Twitter body read failed: {}", e)))
    }

    async fn user_id(&self, account: &str) -> Result<String> {
        if let Some(id) = self.user_ids.get(account) {
            return Ok(id.clone());
        }

        let url = format!("{}/users/by/username/{}", self.api_url, account);
        let body = self.get_text(&url, &[]).await?;
        let lookup: UserLookup = serde_json::from_str(&body)?;
        let id = lookup
            .data
            .map(|user| user.id)
            .ok_or_else(|| BotError::FetchError(format!("Unknown account @{}", account)))?;

        debug!("Resolved @{} to user id {}", account, id);
        self.user_ids.insert(account.to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl SocialFetcher for TwitterClient {
    async fn fetch_account(&self, account: &str) -> Result<Vec<SocialPost>> {
        let user_id = self.user_id(account).await?;
        let url = format!("{}/users/{}/tweets", self.api_url, user_id);
        let body = self
            .get_text(
                &url,
                &[
                    ("max_results", TIMELINE_MAX_RESULTS),
                    ("exclude", "retweets,replies"),
                    ("tweet.fields", "created_at,public_metrics,in_reply_to_user_id"),
                ],
            )
            .await?;

        parse_timeline(account, &body)
            .map_err(|e| BotError::FetchError(format!("Bad timeline for @{}: {}", account, e)))
    }
}

#[async_trait]
impl SocialPublisher for TwitterClient {
    async fn post(&self, text: &str) -> Result<String> {
        let token = self.user_access_token.as_deref().ok_or_else(|| {
            BotError::AuthError("TWITTER_USER_ACCESS_TOKEN is not set".to_string())
        })?;

        info!("Posting tweet: {}", truncate_chars(text, 80));
        let response = self
            .client
            .post(format!("{}/tweets", self.api_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| classify_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = describe_error_response(response).await;
            return Err(classify_post_status(status, detail));
        }

        // Accepted: a body we cannot read no longer means "not posted".
        let body = response.text().await.map_err(|e| {
            BotError::PostOutcomeUnknown(format!("Tweet accepted but body unreadable: {}", e))
        })?;
        let created: CreateTweetResponse = serde_json::from_str(&body).map_err(|e| {
            BotError::PostOutcomeUnknown(format!("Tweet accepted but response unparsable: {}", e))
        })?;
        created
            .data
            .map(|tweet| tweet.id)
            .ok_or_else(|| BotError::PostOutcomeUnknown("Tweet accepted without an id".to_string()))
    }
}
