//! Provider statistics over stored trades.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    provider::STATUS_OK,
    trade::RunId,
    winner::{Verdict, Winner, evaluate_outputs},
};

/// A provider result as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuote {
    pub provider: String,
    pub output_amount: Option<String>,
    pub elapsed: Duration,
    pub status_code: u16,
    pub error: Option<String>,
}

impl StoredQuote {
    pub fn output_value(&self) -> Option<f64> {
        if self.status_code != STATUS_OK {
            return None;
        }
        self.output_amount
            .as_deref()
            .and_then(|amount| amount.parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
    }
}

/// A trade as read back from storage, with its provider results in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTrade {
    pub id: i64,
    pub run_id: RunId,
    pub chain: String,
    pub pair: String,
    pub from_token: String,
    pub to_token: String,
    pub from_token_symbol: String,
    pub to_token_symbol: String,
    pub amount_usd: f64,
    pub input_amount: String,
    pub verdict: Verdict,
    pub results: Vec<StoredQuote>,
}

impl StoredTrade {
    /// Ranks the stored results again. The persisted verdict also carries the
    /// USD spread, which cannot be recomputed without the price.
    pub fn rank(&self) -> Verdict {
        evaluate_outputs(
            self.results
                .iter()
                .filter_map(|q| q.output_value().map(|v| (q.provider.as_str(), v))),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider: String,
    pub total_quotes: u64,
    pub successful_quotes: u64,
    pub error_count: u64,
    /// Successful quotes over trades analyzed, in percent
    pub participation_rate: f64,
    /// Wins over successful quotes, in percent
    pub win_rate: f64,
    /// Mean over successful quotes, in seconds
    pub average_response_time: f64,
    pub total_wins: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRates {
    pub total_trades_analyzed: u64,
    pub providers: Vec<ProviderStats>,
}

#[derive(Default)]
struct Tally {
    total: u64,
    successful: u64,
    wins: u64,
    response_time: f64,
}

/// Win-rate statistics per provider, in order of first appearance.
pub fn win_rates(trades: &[StoredTrade]) -> WinRates {
    let mut order: Vec<&str> = Vec::new();
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for trade in trades {
        for quote in &trade.results {
            let tally = tallies.entry(quote.provider.as_str()).or_insert_with(|| {
                order.push(quote.provider.as_str());
                Tally::default()
            });
            tally.total += 1;
            if quote.output_value().is_some() {
                tally.successful += 1;
                tally.response_time += quote.elapsed.as_secs_f64();
            }
        }

        if let Winner::Provider(name) = trade.rank().winner {
            if let Some(tally) = tallies.get_mut(name.as_str()) {
                tally.wins += 1;
            }
        }
    }

    let total_trades = trades.len() as u64;
    let providers = order
        .into_iter()
        .filter_map(|name| tallies.get(name).map(|t| (name, t)))
        .map(|(name, t)| ProviderStats {
            provider: name.to_string(),
            total_quotes: t.total,
            successful_quotes: t.successful,
            error_count: t.total - t.successful,
            participation_rate: percent(t.successful, total_trades),
            win_rate: percent(t.wins, t.successful),
            average_response_time: if t.successful > 0 {
                t.response_time / t.successful as f64
            } else {
                0.0
            },
            total_wins: t.wins,
        })
        .collect();

    WinRates {
        total_trades_analyzed: total_trades,
        providers,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainPerformance {
    pub total_trades: u64,
    pub provider_wins: BTreeMap<String, u64>,
    pub provider_participations: BTreeMap<String, u64>,
}

/// Wins and successful quotes per provider, grouped by chain.
pub fn chain_performance(trades: &[StoredTrade]) -> BTreeMap<String, ChainPerformance> {
    let mut chains: BTreeMap<String, ChainPerformance> = BTreeMap::new();

    for trade in trades {
        let perf = chains.entry(trade.chain.clone()).or_default();
        perf.total_trades += 1;

        for quote in &trade.results {
            let count = perf
                .provider_participations
                .entry(quote.provider.clone())
                .or_default();
            if quote.output_value().is_some() {
                *count += 1;
            }
        }

        if let Winner::Provider(name) = trade.rank().winner {
            *perf.provider_wins.entry(name).or_default() += 1;
        }
    }

    chains
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
