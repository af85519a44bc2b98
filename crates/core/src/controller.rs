//! Drives one benchmark run across every configured chain.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use color_eyre::eyre::{self, WrapErr as _, eyre};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    amount::to_smallest_units,
    chain::ChainConfig,
    oracle::PriceOracle,
    orchestrator::QuoteOrchestrator,
    pair::TradingPair,
    provider::{Providers, QuoteRequest},
    registry::ChainRegistry,
    store::RunStore,
    trade::{BenchmarkRun, ChainOutcome, ChainReport, RunSummary, TradeBenchmark},
    winner::evaluate,
};

pub struct Builder {
    pub registry: Arc<ChainRegistry>,
    pub oracle: Arc<dyn PriceOracle>,
    pub providers: Providers,
    pub store: Arc<dyn RunStore>,
    pub usd_tiers: Vec<f64>,
    pub call_timeout: Duration,
    pub user_address: Option<String>,
    pub shutdown_token: CancellationToken,
}

impl Builder {
    pub fn build(self) -> eyre::Result<BenchmarkRunController> {
        let Self {
            registry,
            oracle,
            providers,
            store,
            usd_tiers,
            call_timeout,
            user_address,
            shutdown_token,
        } = self;

        if usd_tiers.is_empty() {
            return Err(eyre!("at least one usd tier is required"));
        }
        if let Some(tier) = usd_tiers.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(eyre!("usd tier {tier} must be a positive number"));
        }
        if providers.is_empty() {
            warn!("No quote providers registered, every chain will be skipped");
        }

        Ok(BenchmarkRunController {
            registry,
            oracle,
            providers,
            store,
            usd_tiers,
            orchestrator: QuoteOrchestrator::new(call_timeout),
            user_address,
            shutdown_token,
        })
    }
}

pub struct BenchmarkRunController {
    registry: Arc<ChainRegistry>,
    oracle: Arc<dyn PriceOracle>,
    providers: Providers,
    store: Arc<dyn RunStore>,
    usd_tiers: Vec<f64>,
    orchestrator: QuoteOrchestrator,
    user_address: Option<String>,
    shutdown_token: CancellationToken,
}

/// Trades gathered for one chain, possibly cut short by cancellation.
struct ChainTrades {
    trades: Vec<TradeBenchmark>,
    interrupted: bool,
}

impl BenchmarkRunController {
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs every chain once and commits the result.
    ///
    /// Only failing to open or to commit the run is an error. Chain failures are
    /// reported in the returned summary.
    #[instrument(name = "benchmark_run", skip(self))]
    pub async fn run(&self) -> eyre::Result<RunSummary> {
        let started_at = Utc::now();
        let mut tx = self
            .store
            .create_run(started_at)
            .await
            .wrap_err("failed to create benchmark run")?;
        let run_id = tx.run_id();
        info!(%run_id, chains = self.registry.chains().len(), "Started benchmark run");

        let mut reports = Vec::new();
        for chain in self.registry.chains() {
            if self.shutdown_token.is_cancelled() {
                warn!(chain.id = %chain.id, "Run cancelled, skipping remaining chains");
                break;
            }

            let ChainTrades { trades, interrupted } = self.benchmark_chain(chain).await;
            let count = trades.len();
            let outcome = match tx.attach_trades(trades).await {
                Ok(()) => {
                    info!(chain.id = %chain.id, trades = count, interrupted, "Chain benchmarked");
                    ChainOutcome::Done { trades: count }
                }
                Err(e) => {
                    error!(chain.id = %chain.id, error = %format!("{e:#}"), "Failed to store chain trades");
                    ChainOutcome::Failed {
                        reason: format!("{e:#}"),
                    }
                }
            };

            reports.push(ChainReport {
                chain: chain.id.clone(),
                outcome,
            });
        }

        let cancelled = self.shutdown_token.is_cancelled();
        let ended_at = Utc::now();
        if let Err(e) = tx.finalize(ended_at).await {
            error!(%run_id, error = %format!("{e:#}"), "Failed to finalize run, rolling back");
            if let Err(rollback) = tx.rollback().await {
                error!(%run_id, error = %format!("{rollback:#}"), "Rollback failed");
            }
            return Err(e).wrap_err_with(|| format!("failed to finalize benchmark run {run_id}"));
        }

        let summary = RunSummary {
            run: BenchmarkRun {
                id: run_id,
                started_at,
                ended_at: Some(ended_at),
            },
            chains: reports,
            cancelled,
        };

        let elapsed = (ended_at - started_at).to_std().unwrap_or_default();
        info!(
            %run_id,
            trades = summary.trade_count(),
            failed_chains = summary.failed_chains().count(),
            cancelled,
            elapsed = %humantime::format_duration(elapsed),
            "Finished benchmark run"
        );

        Ok(summary)
    }

    #[instrument(skip_all, fields(chain.id = %chain.id))]
    async fn benchmark_chain(&self, chain: &ChainConfig) -> ChainTrades {
        let providers: Providers = self
            .providers
            .iter()
            .filter(|p| p.supports_chain(&chain.id))
            .cloned()
            .collect();

        let mut result = ChainTrades {
            trades: Vec::new(),
            interrupted: false,
        };

        if providers.is_empty() {
            warn!("No provider supports chain, skipping");
            return result;
        }

        for pair in self.registry.pairs_for(&chain.id) {
            let Some(prices) = self.until_cancelled(self.pair_prices(chain, &pair)).await else {
                result.interrupted = true;
                return result;
            };
            let Some((input_price, output_price)) = prices else {
                continue;
            };

            for &usd in &self.usd_tiers {
                let amount = match to_smallest_units(usd, Some(input_price), pair.input.decimals) {
                    Ok(amount) => amount,
                    Err(e) => {
                        warn!(pair = %pair, usd, error = %e, "Skipping usd tier");
                        continue;
                    }
                };

                let request = QuoteRequest {
                    chain: chain.id.clone(),
                    input: pair.input.clone(),
                    output: pair.output.clone(),
                    amount: amount.clone(),
                    user_address: self.user_address.clone(),
                };

                let Some(quotes) = self
                    .until_cancelled(self.orchestrator.quote_all(&providers, request))
                    .await
                else {
                    result.interrupted = true;
                    return result;
                };

                let verdict = evaluate(&quotes, Some(output_price));
                info!(
                    pair = %pair,
                    usd,
                    winner = %verdict.winner,
                    spread = ?verdict.spread,
                    spread_usd = ?verdict.spread_usd,
                    "Evaluated quotes"
                );

                result
                    .trades
                    .push(TradeBenchmark::new(&chain.id, &pair, usd, amount, quotes, verdict));
            }
        }

        result
    }

    /// USD prices of both sides of the pair. `None` skips the pair.
    async fn pair_prices(&self, chain: &ChainConfig, pair: &TradingPair) -> Option<(f64, f64)> {
        let mut prices = [0.0; 2];
        for (slot, token) in prices.iter_mut().zip([&pair.input, &pair.output]) {
            match self.oracle.usd_price_of(&chain.id, &token.address).await {
                Ok(price) => {
                    debug!(token = %token, price = price.price, "Resolved usd price");
                    *slot = price.price;
                }
                Err(e) => {
                    warn!(pair = %pair, token = %token, error = %e, class = ?e.class(), "Skipping pair");
                    return None;
                }
            }
        }

        Some((prices[0], prices[1]))
    }

    async fn until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        select! {
            biased;

            () = self.shutdown_token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        chain::{ChainId, TokenAddress, fixtures},
        error::Error,
        oracle::UsdPrice,
        orchestrator::testing::{Behavior, FakeProvider},
        provider::QuoteProvider,
        store::memory::MemoryStore,
        winner::Winner,
    };

    struct FakeOracle {
        prices: HashMap<String, f64>,
    }

    impl FakeOracle {
        fn new(prices: &[(&str, f64)]) -> Self {
            Self {
                prices: prices
                    .iter()
                    .map(|(addr, price)| (addr.to_ascii_lowercase(), *price))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PriceOracle for FakeOracle {
        async fn usd_price_of(&self, chain: &ChainId, token: &TokenAddress) -> Result<UsdPrice, Error> {
            self.prices
                .get(&token.key())
                .map(|price| UsdPrice {
                    price: *price,
                    latency: Duration::ZERO,
                })
                .ok_or_else(|| Error::price_unavailable(chain, token, "no quote"))
        }
    }

    const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn all_prices() -> FakeOracle {
        FakeOracle::new(&[
            (fixtures::USDE, 1.0),
            (fixtures::USDT0, 1.0),
            (fixtures::HYPE, 40.0),
            (fixtures::KHYPE, 41.0),
            (USDC, 1.0),
            (WETH, 2.0),
        ])
    }

    fn builder(
        chains: Vec<crate::chain::ChainConfig>,
        oracle: FakeOracle,
        providers: Vec<FakeProvider>,
        store: MemoryStore,
    ) -> Builder {
        Builder {
            registry: Arc::new(ChainRegistry::new(chains).unwrap()),
            oracle: Arc::new(oracle),
            providers: providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn QuoteProvider>)
                .collect(),
            store: Arc::new(store),
            usd_tiers: vec![1.0, 100.0],
            call_timeout: Duration::from_millis(200),
            user_address: None,
            shutdown_token: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn benchmarks_every_pair_and_tier() {
        let store = MemoryStore::default();
        let controller = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            vec![
                FakeProvider::new("A", &["999"], Behavior::Output("100.0")),
                FakeProvider::new("B", &["999"], Behavior::Sleep(Duration::from_secs(5))),
            ],
            store.clone(),
        )
        .build()
        .unwrap();

        let summary = controller.run().await.unwrap();

        assert!(!summary.cancelled);
        assert!(summary.run.ended_at.is_some());
        assert_eq!(summary.trade_count(), 12);

        let recorded = store.recorded.lock().unwrap();
        let (run_id, trades, _) = &recorded.committed[0];
        assert_eq!(*run_id, summary.run.id);
        assert_eq!(trades.len(), 12);
        assert_eq!(trades[0].pair, "USDT0->USDe");
        assert_eq!(trades[0].input_amount, "1000000");

        let trade = &trades[0];
        assert_eq!(trade.results.len(), 2);
        assert_eq!(trade.verdict.winner, Winner::Provider("A".into()));
        assert_eq!(trade.verdict.spread, Some(0.0));
    }

    #[tokio::test]
    async fn converts_usd_tier_with_token_price() {
        let store = MemoryStore::default();
        let mut builder = builder(
            vec![fixtures::six_decimals_usd()],
            all_prices(),
            vec![FakeProvider::new("A", &["1"], Behavior::Output("99.5"))],
            store.clone(),
        );
        builder.usd_tiers = vec![100.0];

        builder.build().unwrap().run().await.unwrap();

        let recorded = store.recorded.lock().unwrap();
        let trades = &recorded.committed[0].1;
        let weth_sell = trades.iter().find(|t| t.pair == "WETH->USDC").unwrap();
        assert_eq!(weth_sell.input_amount, "50000000000000000000");
        let weth_buy = trades.iter().find(|t| t.pair == "USDC->WETH").unwrap();
        assert_eq!(weth_buy.input_amount, "100000000");
    }

    #[tokio::test]
    async fn skips_pairs_without_price() {
        let store = MemoryStore::default();
        let oracle = FakeOracle::new(&[
            (fixtures::USDE, 1.0),
            (fixtures::USDT0, 1.0),
            (fixtures::KHYPE, 41.0),
        ]);
        let controller = builder(
            vec![fixtures::hyperevm()],
            oracle,
            vec![FakeProvider::new("A", &["999"], Behavior::Output("1"))],
            store.clone(),
        )
        .build()
        .unwrap();

        let summary = controller.run().await.unwrap();

        assert_eq!(summary.trade_count(), 8);
        let recorded = store.recorded.lock().unwrap();
        assert!(
            recorded.committed[0]
                .1
                .iter()
                .all(|t| t.pair != "HYPE->USDe" && t.pair != "USDe->HYPE")
        );
    }

    #[tokio::test]
    async fn failing_chain_does_not_stop_the_next() {
        let mut store = MemoryStore::default();
        store.fail_attach_for = Some("999".into());
        let controller = builder(
            vec![fixtures::hyperevm(), fixtures::six_decimals_usd()],
            all_prices(),
            vec![FakeProvider::new("A", &["999", "1"], Behavior::Output("1"))],
            store.clone(),
        )
        .build()
        .unwrap();

        let summary = controller.run().await.unwrap();

        assert!(matches!(summary.chains[0].outcome, ChainOutcome::Failed { .. }));
        assert_eq!(summary.chains[1].outcome, ChainOutcome::Done { trades: 4 });

        let recorded = store.recorded.lock().unwrap();
        let trades = &recorded.committed[0].1;
        assert_eq!(trades.len(), 4);
        assert!(trades.iter().all(|t| t.chain.as_str() == "1"));
    }

    #[tokio::test]
    async fn chain_without_providers_is_done_with_no_trades() {
        let controller = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            vec![FakeProvider::new("A", &["1"], Behavior::Output("1"))],
            MemoryStore::default(),
        )
        .build()
        .unwrap();

        let summary = controller.run().await.unwrap();
        assert_eq!(summary.chains[0].outcome, ChainOutcome::Done { trades: 0 });
    }

    #[tokio::test]
    async fn finalize_failure_rolls_back_and_errors() {
        let mut store = MemoryStore::default();
        store.fail_finalize = true;
        let controller = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            vec![FakeProvider::new("A", &["999"], Behavior::Output("1"))],
            store.clone(),
        )
        .build()
        .unwrap();

        let err = controller.run().await.unwrap_err();

        assert!(format!("{err:#}").contains("failed to finalize benchmark run 1"));
        let recorded = store.recorded.lock().unwrap();
        assert!(recorded.committed.is_empty());
        assert_eq!(recorded.rolled_back, vec![crate::trade::RunId(1)]);
    }

    #[tokio::test]
    async fn cancelled_before_start_still_finalizes() {
        let store = MemoryStore::default();
        let controller = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            vec![FakeProvider::new("A", &["999"], Behavior::Output("1"))],
            store.clone(),
        )
        .build()
        .unwrap();
        controller.shutdown_token().cancel();

        let summary = controller.run().await.unwrap();

        assert!(summary.cancelled);
        assert!(summary.chains.is_empty());
        assert_eq!(store.recorded.lock().unwrap().committed.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_quotes() {
        let store = MemoryStore::default();
        let mut builder = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            vec![FakeProvider::new("A", &["999"], Behavior::Sleep(Duration::from_secs(30)))],
            store.clone(),
        );
        builder.call_timeout = Duration::from_secs(60);
        let controller = builder.build().unwrap();

        let token = controller.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let summary = tokio::time::timeout(Duration::from_secs(5), controller.run())
            .await
            .unwrap()
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.chains[0].outcome, ChainOutcome::Done { trades: 0 });
    }

    #[test]
    fn rejects_non_positive_tiers() {
        let mut builder = builder(
            vec![fixtures::hyperevm()],
            all_prices(),
            Vec::new(),
            MemoryStore::default(),
        );
        builder.usd_tiers = vec![10.0, 0.0];
        assert!(builder.build().is_err());
    }
}
