// src/clients/http.rs
use crate::error::{BotError, Result};
use crate::utils::truncate_chars;
use reqwest::{Client, Response};
use std::time::Duration;

const USER_AGENT: &str = "SignalPostBot/1.0";
const MAX_ERROR_BODY_CHARS: usize = 300;

/// One client for every outbound call; `timeout` bounds each whole request.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| BotError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Status plus a trimmed body, for error messages.
pub async fn describe_error_response(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS))
}
