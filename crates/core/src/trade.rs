use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    chain::{ChainId, TokenAddress},
    orchestrator::QuoteSet,
    pair::TradingPair,
    provider::QuoteResult,
    winner::Verdict,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (pair, USD tier) quote across every provider of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeBenchmark {
    pub chain: ChainId,
    pub pair: String,
    pub from_token: TokenAddress,
    pub to_token: TokenAddress,
    pub from_token_symbol: String,
    pub to_token_symbol: String,
    pub amount_usd: f64,
    /// Input in smallest units
    pub input_amount: String,
    pub results: Vec<QuoteResult>,
    pub verdict: Verdict,
}

impl TradeBenchmark {
    pub fn new(
        chain: &ChainId,
        pair: &TradingPair,
        amount_usd: f64,
        input_amount: String,
        quotes: QuoteSet,
        verdict: Verdict,
    ) -> Self {
        Self {
            chain: chain.clone(),
            pair: pair.name.clone(),
            from_token: pair.input.address.clone(),
            to_token: pair.output.address.clone(),
            from_token_symbol: pair.input.symbol.clone(),
            to_token_symbol: pair.output.symbol.clone(),
            amount_usd,
            input_amount,
            results: quotes.into_results(),
            verdict,
        }
    }
}

/// Timing of a benchmark run. `ended_at` is set once the run is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainOutcome {
    Done { trades: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub chain: ChainId,
    pub outcome: ChainOutcome,
}

/// What a finished run did, returned to the caller of the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: BenchmarkRun,
    pub chains: Vec<ChainReport>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn trade_count(&self) -> usize {
        self.chains
            .iter()
            .map(|c| match c.outcome {
                ChainOutcome::Done { trades } => trades,
                ChainOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_chains(&self) -> impl Iterator<Item = &ChainReport> {
        self.chains
            .iter()
            .filter(|c| matches!(c.outcome, ChainOutcome::Failed { .. }))
    }
}
