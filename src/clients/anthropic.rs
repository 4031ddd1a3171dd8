// src/clients/anthropic.rs
//! Anthropic Messages API client, used both to summarize articles and to write posts.

use super::http::describe_error_response;
use crate::error::{BotError, Result};
use crate::feeds::{Generator, SocialPost, Summarizer};
use crate::generation::GenerationRequest;
use crate::utils::truncate_chars;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_POST_CHARS: usize = 280;
const TOP_SOCIAL_POSTS: usize = 5;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub struct AnthropicClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

const GENERATION_SYSTEM: &str = "You write short, upbeat, factual posts about the crypto \
market for a social feed. Ground every claim in the context you are given. Never invent \
prices or numbers.";

impl AnthropicClient {
    pub fn new(
        client: Client,
        api_url: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }

    /// Sends one user message and returns the concatenated text blocks. Errors come back as
    /// plain strings; callers wrap them in their own variant.
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> std::result::Result<String, String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Anthropic request failed: {}", e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err("Anthropic API rate limited".to_string());
        }
        if !status.is_success() {
            return Err(format!(
                "Anthropic API error {}",
                describe_error_response(response).await
            ));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Anthropic response: {}", e))?;
        Ok(collect_text(&parsed))
    }
}

fn collect_text(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn summary_prompt(title: &str, raw_body: &str) -> String {
    format!(
        "Summarize this crypto news article in a clear, informative way that captures key \
points and market implications. Focus on facts, developments, and potential impact on the \
crypto ecosystem.\n\nTitle: {}\nContent: {}\n\nProvide the summary in a single paragraph \
without any prefixes or labels.",
        title, raw_body
    )
}

fn engagement(post: &SocialPost) -> u64 {
    post.like_count + post.repost_count
}

/// Plain context block: news summaries, most-engaged social posts, top pools, examples.
pub fn render_context(request: &GenerationRequest) -> String {
    let mut out = String::new();

    if !request.news.is_empty() {
        out.push_str("Recent News:\n");
        for item in &request.news {
            let _ = writeln!(out, "- {}: {}", item.title, item.summary);
        }
        out.push('\n');
    }

    let mut posts: Vec<&SocialPost> = request.social.iter().flat_map(|s| &s.posts).collect();
    if !posts.is_empty() {
        posts.sort_by_key(|p| std::cmp::Reverse(engagement(p)));
        out.push_str("Popular Posts:\n");
        for post in posts.into_iter().take(TOP_SOCIAL_POSTS) {
            let _ = writeln!(
                out,
                "- @{} ({} likes, {} reposts): {}",
                post.account, post.like_count, post.repost_count, post.text
            );
        }
        out.push('\n');
    }

    if let Some(market) = request.market.as_ref().filter(|m| !m.pools.is_empty()) {
        out.push_str("Current Market Activity:\n");
        for pool in &market.pools {
            let ratio = pool
                .buy_sell_ratio()
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "- {}: 24h change {:+.2}%, 24h volume ${:.0}, buy/sell {} ({} buys / {} sells)",
                pool.name,
                pool.price_change_24h_pct,
                pool.volume_24h_usd,
                ratio,
                pool.buys_24h,
                pool.sells_24h
            );
        }
        out.push('\n');
    }

    if !request.examples.is_empty() {
        out.push_str("Example Posts:\n");
        for (i, example) in request.examples.iter().enumerate() {
            let _ = writeln!(out, "Example {}: {}", i + 1, example);
        }
        out.push('\n');
    }

    out.push_str(
        "Write one new post under 280 characters. Answer with a single line starting with \
\"TWEET:\" followed by the post.",
    );
    out
}

/// Text after the first `TWEET:` line, or the whole reply when there is none
pub fn extract_post_text(reply: &str) -> String {
    let text = reply
        .lines()
        .find_map(|line| {
            let line = line.trim();
            let prefix = line.get(..6)?;
            if prefix.eq_ignore_ascii_case("TWEET:") {
                Some(line[6..].trim())
            } else {
                None
            }
        })
        .unwrap_or_else(|| reply.trim());

    let text = text.trim_matches('"').trim();
    truncate_chars(text, MAX_POST_CHARS)
}

#[async_trait]
impl Summarizer for AnthropicClient {
    async fn summarize(&self, title: &str, raw_body: &str) -> Result<String> {
        debug!("Summarizing: {}", title);
        self.complete(None, &summary_prompt(title, raw_body))
            .await
            .map_err(BotError::SummarizationError)
    }
}

#[async_trait]
impl Generator for AnthropicClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let reply = self
            .complete(Some(GENERATION_SYSTEM), &render_context(request))
            .await
            .map_err(BotError::GenerationError)?;
        Ok(extract_post_text(&reply))
    }
}
