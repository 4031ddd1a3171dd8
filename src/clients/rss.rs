// src/clients/rss.rs
use super::http::describe_error_response;
use crate::error::{BotError, Result};
use crate::feeds::{NewsFetcher, RawArticle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::Client;
use ::rss::Channel;

/// Reads an RSS 2.0 feed. Item bodies are reduced to plain text.
pub struct RssNewsFetcher {
    client: Client,
    feed_url: String,
}

impl RssNewsFetcher {
    pub fn new(client: Client, feed_url: &str) -> Self {
        Self {
            client,
            feed_url: feed_url.to_string(),
        }
    }
}

/// Removes markup and collapses whitespace
pub fn strip_html(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#8217;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Items without a link are skipped.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawArticle>> {
    let channel = Channel::read_from(bytes)
        .map_err(|e| BotError::FetchError(format!("Invalid RSS feed: {}", e)))?;

    let articles = channel
        .items()
        .iter()
        .filter_map(|item| {
            let url = item.link()?.trim().to_string();
            if url.is_empty() {
                return None;
            }
            let body = item
                .content()
                .or_else(|| item.description())
                .map(strip_html)
                .unwrap_or_default();
            Some(RawArticle {
                url,
                title: item.title().map(strip_html).unwrap_or_default(),
                raw_body: body,
                published_at: item.pub_date().and_then(parse_pub_date),
            })
        })
        .collect();
    Ok(articles)
}

#[async_trait]
impl NewsFetcher for RssNewsFetcher {
    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        debug!("Fetching RSS feed {}", self.feed_url);
        let response = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| BotError::FetchError(format!("RSS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::FetchError(format!(
                "RSS feed error {}",
                describe_error_response(response).await
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::FetchError(format!("RSS body read failed: {}", e)))?;
        let articles = parse_feed(&bytes)?;
        info!("Fetched {} articles from RSS feed", articles.len());
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Crypto News</title>
    <link>https://news.example.com</link>
    <description>Latest</description>
    <item>
      <title>Bitcoin &amp; friends rally</title>
      <link>https://news.example.com/a/1</link>
      <description><![CDATA[<p>Markets <b>surged</b> today.</p>]]></description>
      <pubDate>Tue, 05 Mar 2024 14:30:00 +0000</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <description>dropped</description>
    </item>
    <item>
      <title>Undated story</title>
      <link>https://news.example.com/a/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed() {
        let articles = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(articles.len(), 2);

        assert_eq!(articles[0].title, "Bitcoin & friends rally");
        assert_eq!(articles[0].raw_body, "Markets surged today.");
        assert_eq!(
            articles[0].published_at.map(|d| d.to_rfc3339()),
            Some("2024-03-05T14:30:00+00:00".to_string())
        );
        assert_eq!(articles[1].published_at, None);
        assert_eq!(articles[1].raw_body, "");
    }

    #[test]
    fn test_invalid_feed_is_fetch_error() {
        assert!(matches!(
            parse_feed(b"not xml at all"),
            Err(BotError::FetchError(_))
        ));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<div>Hello&nbsp;<a href=\"x\">world</a></div>\n\n &lt;3"),
            "Hello world <3"
        );
    }
}
