use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::{
    chain::{ChainId, TokenAddress},
    error::Error,
    provider::http_client,
    registry::ChainRegistry,
};

pub const DEFAULT_EXCHANGE_RATES_URL: &str = "https://exchange-rates.gluex.xyz";

/// A token's price in units of its chain's normalization token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsdPrice {
    pub price: f64,
    pub latency: Duration,
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn usd_price_of(&self, chain: &ChainId, token: &TokenAddress) -> Result<UsdPrice, Error>;
}

#[derive(Debug, Serialize)]
struct RateQuery<'a> {
    domestic_blockchain: &'a str,
    domestic_token: &'a str,
    foreign_blockchain: &'a str,
    foreign_token: &'a str,
}

/// Prices tokens against the normalization token through the exchange-rate service.
pub struct ExchangeRateOracle {
    client: Client,
    url: String,
    registry: Arc<ChainRegistry>,
}

impl ExchangeRateOracle {
    pub fn new(registry: Arc<ChainRegistry>, url: &str, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.trim_end_matches('/').to_string(),
            registry,
        })
    }
}

#[async_trait]
impl PriceOracle for ExchangeRateOracle {
    #[instrument(skip(self), fields(chain.id = %chain, token = %token))]
    async fn usd_price_of(&self, chain: &ChainId, token: &TokenAddress) -> Result<UsdPrice, Error> {
        let unavailable = |reason: String| Error::price_unavailable(chain, token, reason);

        let config = self
            .registry
            .chain(chain)
            .map_err(|e| unavailable(e.to_string()))?;

        if config.is_normalization_token(token) {
            return Ok(UsdPrice {
                price: 1.0,
                latency: Duration::ZERO,
            });
        }

        let decimals = self.registry.decimals();
        let token_decimals = decimals.lookup(token).map_err(|e| unavailable(e.to_string()))?;
        let norm = &config.normalization_token;

        let query = [RateQuery {
            domestic_blockchain: &config.blockchain,
            domestic_token: token.as_str(),
            foreign_blockchain: &config.blockchain,
            foreign_token: norm.address.as_str(),
        }];

        let started = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .json(&query)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Exchange-rate request failed");
                unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP {}: {body}", status.as_u16())));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| unavailable(format!("malformed response: {e}")))?;
        let latency = started.elapsed();

        let raw = first_price(&payload).map_err(unavailable)?;
        let price = adjust_for_decimals(raw, norm.decimals, token_decimals);

        debug!(raw, price, latency = %humantime::format_duration(latency), "Fetched usd price");
        Ok(UsdPrice { price, latency })
    }
}

fn first_price(payload: &Value) -> Result<f64, String> {
    let entry = payload
        .as_array()
        .ok_or("response is not a list")?
        .first()
        .ok_or("response list is empty")?;

    let price = match entry.get("price") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or("no price for requested token")?;

    if !price.is_finite() || price <= 0.0 {
        return Err(format!("non-positive price {price}"));
    }

    Ok(price)
}

/// The service quotes smallest-unit ratios. Dividing by
/// `10^(norm_decimals - token_decimals)` gives the human-unit price.
fn adjust_for_decimals(raw: f64, norm_decimals: u32, token_decimals: u32) -> f64 {
    raw / 10f64.powi(norm_decimals as i32 - token_decimals as i32)
}
