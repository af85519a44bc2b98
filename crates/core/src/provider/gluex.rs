use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::FromPrimitive as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value, json};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::{
    QuoteProvider, QuoteRequest, QuoteResult, STATUS_INTERNAL, STATUS_OK, chain_set, http_client,
    read_body, transport_failure,
};
use crate::{amount::format_units, chain::ChainId, error::Error, registry::DecimalRegistry};

const NAME: &str = "GlueX";
const SUPPORTED_CHAINS: &[&str] = &["1", "10", "56", "100", "137", "42161", "999", "8453", "43114"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GluexConfig {
    /// Quote endpoint
    pub url: String,

    /// Sent as `x-api-key`
    pub api_key: String,

    /// Partner id attached to every quote
    pub unique_pid: String,
}

/// GlueX router quotes. Outputs come back in smallest units.
pub struct GluexProvider {
    client: Client,
    config: GluexConfig,
    user_address: String,
    decimals: Arc<DecimalRegistry>,
    chains: HashSet<ChainId>,
}

impl GluexProvider {
    pub fn new(
        config: GluexConfig,
        user_address: &str,
        decimals: Arc<DecimalRegistry>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(timeout)?,
            config,
            user_address: user_address.to_string(),
            decimals,
            chains: chain_set(SUPPORTED_CHAINS),
        })
    }

    fn body(&self, request: &QuoteRequest) -> Value {
        let user = request.user_address.as_deref().unwrap_or(&self.user_address);
        json!({
            "userAddress": user,
            "outputReceiver": user,
            "isPermit2": false,
            "computeStable": true,
            "computeEstimate": true,
            "inputToken": request.input.address.as_str(),
            "outputToken": request.output.address.as_str(),
            "inputAmount": request.amount,
            "networkID": request.chain.as_str(),
            "uniquePID": self.config.unique_pid,
        })
    }
}

#[async_trait]
impl QuoteProvider for GluexProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_chains(&self) -> &HashSet<ChainId> {
        &self.chains
    }

    #[instrument(skip_all, fields(provider = NAME, chain.id = %request.chain))]
    async fn get_quote(&self, request: &QuoteRequest) -> QuoteResult {
        let started = Instant::now();

        let output_decimals = match self.decimals.lookup(&request.output.address) {
            Ok(decimals) => decimals,
            Err(e) => return QuoteResult::failed(NAME, STATUS_INTERNAL, e.to_string(), started.elapsed()),
        };

        let response = match self
            .client
            .post(&self.config.url)
            .header("x-api-key", &self.config.api_key)
            .json(&self.body(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "GlueX request failed");
                return transport_failure(NAME, &e, started.elapsed());
            }
        };

        let payload = match read_body(NAME, response, started.elapsed()).await {
            Ok(payload) => payload,
            Err(failed) => return failed,
        };
        let elapsed = started.elapsed();

        let raw_output = match payload.pointer("/result/outputAmount") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => match integer_digits(n) {
                Some(digits) => digits,
                None => {
                    let error = format!("Unsupported numeric outputAmount {n}");
                    return QuoteResult::failed(NAME, STATUS_OK, error, elapsed).with_raw_response(payload);
                }
            },
            _ => {
                return QuoteResult::failed(NAME, STATUS_OK, "No outputAmount in response", elapsed)
                    .with_raw_response(payload);
            }
        };

        match format_units(&raw_output, output_decimals) {
            Ok(output) => {
                debug!(raw = %raw_output, output = %output, decimals = output_decimals, "GlueX quote");
                QuoteResult::success(NAME, output, elapsed, payload)
            }
            Err(e) => QuoteResult::failed(NAME, STATUS_OK, e.to_string(), elapsed).with_raw_response(payload),
        }
    }
}

/// Plain decimal digits of a non-negative integral JSON number. Integers past
/// `u64` arrive as floats and are expanded instead of printed in exponent form.
fn integer_digits(n: &Number) -> Option<String> {
    if let Some(value) = n.as_u64() {
        return Some(value.to_string());
    }

    n.as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
        .and_then(BigUint::from_f64)
        .map(|v| v.to_string())
}
