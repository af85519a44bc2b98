use quotebench_core::{
    amount::to_smallest_units,
    chain::{ChainId, TokenAddress, TokenSpec},
    config::Config,
    error::Error,
    oracle::{ExchangeRateOracle, PriceOracle as _},
    orchestrator::QuoteOrchestrator,
    provider::QuoteRequest,
    registry::ChainRegistry,
    winner::evaluate,
};
use std::sync::Arc;

use color_eyre::eyre::{self, WrapErr as _};
use tracing::{info, warn};

#[derive(clap::Args, Debug)]
pub(crate) struct Quote {
    /// Chain id to quote on
    #[arg(long)]
    pub(crate) chain: String,

    /// Input token, by symbol or address
    #[arg(long)]
    pub(crate) from: String,

    /// Output token, by symbol or address
    #[arg(long)]
    pub(crate) to: String,

    /// Trade size in USD
    #[arg(long, default_value_t = 100.0)]
    pub(crate) usd: f64,
}

impl Quote {
    pub(crate) async fn run(&self, config: Config, registry: Arc<ChainRegistry>) -> eyre::Result<()> {
        let chain = ChainId::from(self.chain.as_str());
        let input = resolve_token(&registry, &chain, &self.from)?.clone();
        let output = resolve_token(&registry, &chain, &self.to)?.clone();

        let oracle = ExchangeRateOracle::new(
            Arc::clone(&registry),
            &config.exchange_rates_url,
            config.request_timeout(),
        )?;
        let providers = config.build_providers(&registry.decimals())?;

        let input_price = oracle
            .usd_price_of(&chain, &input.address)
            .await
            .wrap_err_with(|| format!("no usd price for {}", input.symbol))?;
        let output_price = match oracle.usd_price_of(&chain, &output.address).await {
            Ok(price) => Some(price.price),
            Err(e) => {
                warn!(token = %output.symbol, error = %e, "No usd price for output, spread stays in token units");
                None
            }
        };

        let amount = to_smallest_units(self.usd, Some(input_price.price), input.decimals)?;
        info!(%amount, input = %input.symbol, output = %output.symbol, "Requesting quotes");

        let quotes = QuoteOrchestrator::new(config.request_timeout())
            .quote_all(
                &providers,
                QuoteRequest {
                    chain,
                    input,
                    output,
                    amount,
                    user_address: Some(config.user_address.clone()),
                },
            )
            .await;
        let verdict = evaluate(&quotes, output_price);

        for result in quotes.iter() {
            println!(
                "{:<12} {:>4} {:>12} {}",
                result.provider,
                result.status_code,
                humantime::format_duration(result.elapsed),
                result
                    .output_amount
                    .as_deref()
                    .or(result.error.as_deref())
                    .unwrap_or("-"),
            );
        }
        println!("{}", serde_json::to_string_pretty(&verdict)?);

        Ok(())
    }
}

/// Finds a configured token by address when given one, otherwise by symbol.
fn resolve_token<'a>(
    registry: &'a ChainRegistry,
    chain: &ChainId,
    token: &str,
) -> Result<&'a TokenSpec, Error> {
    if token.starts_with("0x") {
        registry.token(chain, &TokenAddress::from(token))
    } else {
        registry.token_by_symbol(chain, token)
    }
}
