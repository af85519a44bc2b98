use quotebench_core::{
    chain::ChainId,
    config::Config,
    controller::Builder,
    database::Handle,
    oracle::ExchangeRateOracle,
    registry::ChainRegistry,
    trade::ChainOutcome,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::eyre::{self, WrapErr as _};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(clap::Args, Debug)]
pub(crate) struct Run {
    /// Only benchmark these chain ids
    #[arg(long = "chain")]
    pub(crate) chains: Vec<String>,

    /// USD notionals to quote, overriding the configured tiers
    #[arg(long = "usd", value_delimiter = ',')]
    pub(crate) usd_tiers: Vec<f64>,
}

impl Run {
    pub(crate) async fn run(
        &self,
        config: Config,
        registry: Arc<ChainRegistry>,
        shutdown_token: CancellationToken,
    ) -> eyre::Result<()> {
        let registry = self.select_chains(registry)?;
        let usd_tiers = if self.usd_tiers.is_empty() {
            config.usd_tiers.clone()
        } else {
            self.usd_tiers.clone()
        };

        let handle = Handle::from_config(&config.database)?;
        handle
            .ensure_schema()
            .await
            .wrap_err("failed to prepare database")?;

        let oracle = ExchangeRateOracle::new(
            Arc::clone(&registry),
            &config.exchange_rates_url,
            config.request_timeout(),
        )?;
        let providers = config.build_providers(&registry.decimals())?;

        let controller = Builder {
            registry,
            oracle: Arc::new(oracle),
            providers,
            store: Arc::new(handle.run_store()),
            usd_tiers,
            call_timeout: config.request_timeout(),
            user_address: Some(config.user_address.clone()),
            shutdown_token,
        }
        .build()?;

        let started = Instant::now();
        let summary = controller.run().await?;
        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);

        for report in &summary.chains {
            match &report.outcome {
                ChainOutcome::Done { trades } => {
                    info!(chain.id = %report.chain, trades, "Chain stored")
                }
                ChainOutcome::Failed { reason } => {
                    warn!(chain.id = %report.chain, reason, "Chain failed")
                }
            }
        }

        info!(
            run_id = %summary.run.id,
            trades = summary.trade_count(),
            failed_chains = summary.failed_chains().count(),
            cancelled = summary.cancelled,
            elapsed = %humantime::format_duration(elapsed),
            "Benchmark run stored"
        );
        println!(
            "run {} stored with {} trades in {}",
            summary.run.id,
            summary.trade_count(),
            humantime::format_duration(elapsed)
        );

        Ok(())
    }

    /// Narrows the registry to the requested chains, keeping configured order.
    fn select_chains(&self, registry: Arc<ChainRegistry>) -> eyre::Result<Arc<ChainRegistry>> {
        if self.chains.is_empty() {
            return Ok(registry);
        }

        for id in &self.chains {
            registry.chain(&ChainId::from(id.as_str()))?;
        }

        let selected = registry
            .chains()
            .iter()
            .filter(|c| self.chains.iter().any(|id| id == c.id.as_str()))
            .cloned()
            .collect();

        Ok(Arc::new(ChainRegistry::new(selected)?))
    }
}

#[cfg(test)]
mod tests {
    use quotebench_core::chain::{ChainConfig, TokenSpec};

    use super::*;

    fn registry() -> Arc<ChainRegistry> {
        let chain = |id: &str, name: &str| ChainConfig {
            id: ChainId::from(id),
            blockchain: name.to_string(),
            normalization_token: TokenSpec::new("0x01", "USD", 6),
            trading_tokens: vec![TokenSpec::new("0x02", "ETH", 18)],
        };
        Arc::new(ChainRegistry::new(vec![chain("1", "ethereum"), chain("999", "hyperevm")]).unwrap())
    }

    fn run(chains: &[&str]) -> Run {
        Run {
            chains: chains.iter().map(|c| c.to_string()).collect(),
            usd_tiers: Vec::new(),
        }
    }

    #[test]
    fn keeps_every_chain_without_filter() {
        let selected = run(&[]).select_chains(registry()).unwrap();
        assert_eq!(selected.chains().len(), 2);
    }

    #[test]
    fn keeps_configured_order() {
        let selected = run(&["999", "1"]).select_chains(registry()).unwrap();
        let ids: Vec<&str> = selected.chains().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "999"]);
    }

    #[test]
    fn unknown_chain_is_rejected() {
        assert!(run(&["42"]).select_chains(registry()).is_err());
    }
}
