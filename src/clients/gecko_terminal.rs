// src/clients/gecko_terminal.rs
use super::http::describe_error_response;
use crate::error::{BotError, Result};
use crate::feeds::{MarketFetcher, TrendingPool};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;

const TRENDING_POOLS_ENDPOINT: &str = "networks/trending_pools";
const ACCEPT_HEADER: &str = "application/json;version=20230302";

pub struct GeckoTerminalClient {
    client: Client,
    base_url: String,
    min_volume_24h_usd: f64,
    min_liquidity_usd: f64,
}

impl GeckoTerminalClient {
    pub fn new(
        client: Client,
        base_url: &str,
        min_volume_24h_usd: f64,
        min_liquidity_usd: f64,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            min_volume_24h_usd,
            min_liquidity_usd,
        }
    }
}

/// GeckoTerminal sends most numbers as strings
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Token symbols from a `"BASE / QUOTE"` pool name, falling back to relationship ids
fn token_symbols(name: &str, pool: &Value) -> (String, String) {
    let mut parts = name.split(" / ");
    if let (Some(base), Some(quote)) = (parts.next(), parts.next()) {
        let quote = quote.split_whitespace().next().unwrap_or(quote);
        return (base.trim().to_string(), quote.trim().to_string());
    }

    let relationship_id = |key: &str| {
        pool.pointer(&format!("/relationships/{}/data/id", key))
            .and_then(Value::as_str)
            .and_then(|id| id.rsplit('_').next())
            .unwrap_or_default()
            .to_string()
    };
    (relationship_id("base_token"), relationship_id("quote_token"))
}

/// Keeps pools above both thresholds, highest 24h volume first.
pub fn parse_trending_pools(
    body: &Value,
    min_volume_24h_usd: f64,
    min_liquidity_usd: f64,
) -> Result<Vec<TrendingPool>> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| BotError::FetchError("trending pools response has no data".to_string()))?;

    let mut pools: Vec<TrendingPool> = data
        .iter()
        .filter_map(|pool| {
            let attrs = pool.get("attributes")?;
            let volume_24h_usd = lenient_f64(attrs.pointer("/volume_usd/h24")).unwrap_or(0.0);
            let liquidity_usd = lenient_f64(attrs.get("reserve_in_usd")).unwrap_or(0.0);
            if volume_24h_usd < min_volume_24h_usd || liquidity_usd < min_liquidity_usd {
                return None;
            }

            let name = attrs.get("name").and_then(Value::as_str).unwrap_or_default();
            let (base_token, quote_token) = token_symbols(name, pool);
            Some(TrendingPool {
                name: name.to_string(),
                base_token,
                quote_token,
                price_change_24h_pct: lenient_f64(attrs.pointer("/price_change_percentage/h24"))
                    .unwrap_or(0.0),
                volume_24h_usd,
                liquidity_usd,
                market_cap_usd: lenient_f64(attrs.get("market_cap_usd")),
                buys_24h: lenient_u64(attrs.pointer("/transactions/h24/buys")),
                sells_24h: lenient_u64(attrs.pointer("/transactions/h24/sells")),
            })
        })
        .collect();

    pools.sort_by(|a, b| b.volume_24h_usd.total_cmp(&a.volume_24h_usd));
    Ok(pools)
}

#[async_trait]
impl MarketFetcher for GeckoTerminalClient {
    async fn fetch_trending_pools(&self) -> Result<Vec<TrendingPool>> {
        let url = format!("{}/{}", self.base_url, TRENDING_POOLS_ENDPOINT);
        debug!("Requesting trending pools: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", ACCEPT_HEADER)
            .send()
            .await
            .map_err(|e| BotError::FetchError(format!("GeckoTerminal request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(BotError::FetchError(format!(
                "GeckoTerminal API error {}",
                describe_error_response(response).await
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BotError::FetchError(format!("Failed to parse trending pools: {}", e)))?;
        let pools = parse_trending_pools(&body, self.min_volume_24h_usd, self.min_liquidity_usd)?;
        info!("Fetched and filtered {} trending pools", pools.len());
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use serde_json::json;

    fn pool(name: &str, volume: &str, liquidity: &str) -> Value {
        json!({
            "id": "solana_abc",
            "attributes": {
                "name": name,
                "reserve_in_usd": liquidity,
                "market_cap_usd": null,
                "volume_usd": { "h1": "10", "h24": volume },
                "price_change_percentage": { "h24": "-3.25" },
                "transactions": { "h24": { "buys": 420, "sells": 210 } }
            },
            "relationships": {
                "base_token": { "data": { "id": "solana_BASEMINT" } },
                "quote_token": { "data": { "id": "solana_QUOTEMINT" } }
            }
        })
    }

    #[test]
    fn test_parse_filters_and_sorts() {
        let body = json!({
            "data": [
                pool("BONK / SOL", "150000.5", "60000"),
                pool("DUST / SOL", "99999", "900000"),
                pool("JUP / USDC 0.3%", "2500000", "700000"),
                pool("THIN / SOL", "5000000", "100"),
            ]
        });

        let pools = parse_trending_pools(&body, 100_000.0, 50_000.0).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].base_token, "JUP");
        assert_eq!(pools[0].quote_token, "USDC");
        assert_eq!(pools[1].name, "BONK / SOL");
        assert_approx_eq!(pools[1].volume_24h_usd, 150000.5);
        assert_approx_eq!(pools[1].price_change_24h_pct, -3.25);
        assert_approx_eq!(pools[1].buy_sell_ratio().unwrap(), 2.0);
        assert_eq!(pools[1].market_cap_usd, None);
    }

    #[test]
    fn test_unnamed_pool_uses_relationship_ids() {
        let mut raw = pool("", "200000", "200000");
        raw["attributes"]["name"] = Value::Null;
        let pools = parse_trending_pools(&json!({ "data": [raw] }), 0.0, 0.0).unwrap();
        assert_eq!(pools[0].base_token, "BASEMINT");
        assert_eq!(pools[0].quote_token, "QUOTEMINT");
    }

    #[test]
    fn test_missing_data_is_fetch_error() {
        assert!(parse_trending_pools(&json!({ "errors": [] }), 0.0, 0.0).is_err());
    }
}
