use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    chain::{ChainId, TokenSpec},
    error::Error,
};

pub use gluex::{GluexConfig, GluexProvider};
pub use liqdswap::{LiqdswapConfig, LiqdswapProvider};

mod gluex;
mod liqdswap;

pub const STATUS_OK: u16 = 200;
pub const STATUS_TIMEOUT: u16 = 408;
pub const STATUS_INTERNAL: u16 = 500;

/// A single quote to request from every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub chain: ChainId,
    pub input: TokenSpec,
    pub output: TokenSpec,
    /// Input amount in the input token's smallest units
    pub amount: String,
    /// Address the quote is requested for
    pub user_address: Option<String>,
}

/// Normalized answer of one provider for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub provider: String,
    /// Output in human units of the output token
    pub output_amount: Option<String>,
    pub elapsed: Duration,
    pub status_code: u16,
    pub error: Option<String>,
    pub raw_response: Option<Value>,
}

impl QuoteResult {
    pub fn success(provider: &str, output_amount: String, elapsed: Duration, raw: Value) -> Self {
        Self {
            provider: provider.to_string(),
            output_amount: Some(output_amount),
            elapsed,
            status_code: STATUS_OK,
            error: None,
            raw_response: Some(raw),
        }
    }

    pub fn failed(provider: &str, status_code: u16, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            provider: provider.to_string(),
            output_amount: None,
            elapsed,
            status_code,
            error: Some(error.into()),
            raw_response: None,
        }
    }

    pub fn timed_out(provider: &str, elapsed: Duration) -> Self {
        Self::failed(provider, STATUS_TIMEOUT, "Request timeout", elapsed)
    }

    pub fn with_raw_response(mut self, raw: Value) -> Self {
        self.raw_response = Some(raw);
        self
    }

    /// The output as a number when the quote is usable for ranking.
    pub fn output_value(&self) -> Option<f64> {
        if self.status_code != STATUS_OK {
            return None;
        }

        self.output_amount
            .as_deref()
            .and_then(|amount| amount.parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
    }

    pub fn is_valid(&self) -> bool {
        self.output_value().is_some()
    }
}

/// A DEX aggregator that can quote swaps.
///
/// Implementations turn every failure into a [`QuoteResult`] with no output.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    fn supported_chains(&self) -> &HashSet<ChainId>;

    fn supports_chain(&self, chain: &ChainId) -> bool {
        self.supported_chains().contains(chain)
    }

    async fn get_quote(&self, request: &QuoteRequest) -> QuoteResult;
}

pub type Providers = Vec<Arc<dyn QuoteProvider>>;

/// Registered providers, as names, for logging.
pub fn provider_names(providers: &[Arc<dyn QuoteProvider>]) -> Vec<&str> {
    providers.iter().map(|p| p.name()).collect()
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, Error> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build http client: {e}")))
}

pub(crate) fn chain_set(ids: &[&str]) -> HashSet<ChainId> {
    ids.iter().map(|id| ChainId::from(*id)).collect()
}

/// Maps a transport error onto the status code recorded for it.
pub(crate) fn transport_failure(provider: &str, err: &reqwest::Error, elapsed: Duration) -> QuoteResult {
    if err.is_timeout() {
        return QuoteResult::timed_out(provider, elapsed);
    }

    let status = err.status().map(|s| s.as_u16()).unwrap_or(STATUS_INTERNAL);
    QuoteResult::failed(provider, status, format!("Request error: {err}"), elapsed)
}

/// Reads a response body, keeping non-JSON bodies as a JSON string.
///
/// A non-2xx status becomes a failed result carrying the body.
pub(crate) async fn read_body(
    provider: &str,
    response: Response,
    elapsed: Duration,
) -> Result<Value, QuoteResult> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| transport_failure(provider, &e, elapsed))?;

    if !status.is_success() {
        return Err(QuoteResult::failed(
            provider,
            status.as_u16(),
            format!("HTTP {}: {text}", status.as_u16()),
            elapsed,
        )
        .with_raw_response(Value::String(text)));
    }

    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(e) => Err(QuoteResult::failed(
            provider,
            STATUS_INTERNAL,
            format!("Malformed response: {e}"),
            elapsed,
        )
        .with_raw_response(Value::String(text))),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;

    pub(crate) async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}
