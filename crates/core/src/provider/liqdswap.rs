use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::{
    QuoteProvider, QuoteRequest, QuoteResult, STATUS_INTERNAL, STATUS_OK, chain_set, http_client,
    read_body, transport_failure,
};
use crate::{amount::format_units, chain::ChainId, error::Error, registry::DecimalRegistry};

const NAME: &str = "Liqdswap";
const SUPPORTED_CHAINS: &[&str] = &["999"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiqdswapConfig {
    /// Quote endpoint
    pub url: String,
}

/// Liqd.ag quotes on HyperEVM. Amounts are exchanged in human units both ways.
pub struct LiqdswapProvider {
    client: Client,
    config: LiqdswapConfig,
    decimals: Arc<DecimalRegistry>,
    chains: HashSet<ChainId>,
}

impl LiqdswapProvider {
    pub fn new(
        config: LiqdswapConfig,
        decimals: Arc<DecimalRegistry>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(timeout)?,
            config,
            decimals,
            chains: chain_set(SUPPORTED_CHAINS),
        })
    }
}

#[async_trait]
impl QuoteProvider for LiqdswapProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_chains(&self) -> &HashSet<ChainId> {
        &self.chains
    }

    #[instrument(skip_all, fields(provider = NAME, chain.id = %request.chain))]
    async fn get_quote(&self, request: &QuoteRequest) -> QuoteResult {
        let started = Instant::now();

        let amount = match self
            .decimals
            .lookup(&request.input.address)
            .and_then(|decimals| format_units(&request.amount, decimals))
        {
            Ok(amount) => amount,
            Err(e) => return QuoteResult::failed(NAME, STATUS_INTERNAL, e.to_string(), started.elapsed()),
        };

        let response = match self
            .client
            .get(&self.config.url)
            .query(&[
                ("inputToken", request.input.address.as_str()),
                ("outputToken", request.output.address.as_str()),
                ("amount", amount.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Liqdswap request failed");
                return transport_failure(NAME, &e, started.elapsed());
            }
        };

        let payload = match read_body(NAME, response, started.elapsed()).await {
            Ok(payload) => payload,
            Err(failed) => return failed,
        };
        let elapsed = started.elapsed();

        let output = match payload.get("estimatedTotalOutput") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if s.trim().parse::<f64>().is_ok() => Some(s.trim().to_string()),
            _ => None,
        };

        match output {
            Some(output) => {
                debug!(amount = %amount, output = %output, "Liqdswap quote");
                QuoteResult::success(NAME, output, elapsed, payload)
            }
            None => QuoteResult::failed(NAME, STATUS_OK, "No estimatedTotalOutput in response", elapsed)
                .with_raw_response(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;

    use super::*;
    use crate::{
        chain::{TokenSpec, fixtures},
        provider::testing::serve,
        registry::ChainRegistry,
    };

    fn provider(url: &str) -> LiqdswapProvider {
        let registry = ChainRegistry::new(vec![fixtures::hyperevm()]).unwrap();
        LiqdswapProvider::new(
            LiqdswapConfig { url: url.to_string() },
            registry.decimals(),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn request() -> QuoteRequest {
        QuoteRequest {
            chain: ChainId::from("999"),
            input: TokenSpec::new(fixtures::USDT0, "USDT0", 6),
            output: TokenSpec::new(fixtures::USDE, "USDe", 18),
            amount: "2500000".into(),
            user_address: None,
        }
    }

    #[test]
    fn only_supports_hyperevm() {
        let provider = provider("http://127.0.0.1:9");
        assert!(provider.supports_chain(&ChainId::from("999")));
        assert!(!provider.supports_chain(&ChainId::from("1")));
    }

    #[tokio::test]
    async fn sends_human_amount_and_passes_output_through() {
        let router = Router::new().route(
            "/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["amount"], "2.5");
                assert_eq!(params["inputToken"], fixtures::USDT0);
                Json(json!({ "estimatedTotalOutput": 2.49 }))
            }),
        );
        let url = serve(router).await;

        let result = provider(&url).get_quote(&request()).await;

        assert_eq!(result.provider, "Liqdswap");
        assert_eq!(result.output_amount.as_deref(), Some("2.49"));
        assert_eq!(result.output_value(), Some(2.49));
    }

    #[tokio::test]
    async fn missing_output_is_a_failure() {
        let router = Router::new().route("/", get(|| async { Json(json!({ "route": [] })) }));
        let url = serve(router).await;

        let result = provider(&url).get_quote(&request()).await;

        assert!(result.output_amount.is_none());
        assert!(result.error.is_some());
        assert_eq!(result.raw_response, Some(json!({ "route": [] })));
    }

    #[tokio::test]
    async fn connection_refused_is_500() {
        let result = provider("http://127.0.0.1:9").get_quote(&request()).await;

        assert_eq!(result.status_code, STATUS_INTERNAL);
        assert!(result.error.unwrap().starts_with("Request error"));
    }
}
