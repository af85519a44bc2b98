use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, Utc};
use quotebench_core::{
    analytics::{ChainPerformance, ProviderStats, StoredTrade},
    database::RunOverview,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: Option<u32>,
    pub total_items: Option<u64>,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    #[serde(deserialize_with = "deserialize_optional", default)]
    pub page: Option<u32>,
    #[serde(deserialize_with = "deserialize_optional", default)]
    pub page_size: Option<u32>,
}

/// Query strings carry every value as text, including numbers nested in
/// flattened structs.
pub(crate) fn deserialize_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    use serde::de::Error;
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => s.parse().map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

impl PaginationQuery {
    pub fn sanitize(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }

    pub fn to_offset_limit(&self) -> (u32, u32) {
        let (page, page_size) = self.sanitize();
        let offset = (page - 1).saturating_mul(page_size);
        (offset, page_size)
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, page_size: u32, total_items: Option<u64>) -> Self {
        let total_pages = total_items.map(|total| {
            if total == 0 {
                1
            } else {
                ((total - 1) / page_size as u64 + 1) as u32
            }
        });

        let has_next = total_items
            .map(|total| (page as u64 * page_size as u64) < total)
            .unwrap_or(!data.is_empty() && data.len() == page_size as usize);

        let has_previous = page > 1;

        Self {
            data,
            pagination: PaginationInfo {
                page,
                page_size,
                total_pages,
                total_items,
                has_next,
                has_previous,
            },
        }
    }
}

/// One trade in a run's detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSummary {
    pub id: i64,
    pub chain: String,
    pub pair: String,
    pub from_token: String,
    pub to_token: String,
    pub amount_usd: f64,
    pub input_amount: String,
    pub winner: String,
    pub provider_results_count: usize,
}

impl From<&StoredTrade> for TradeSummary {
    fn from(trade: &StoredTrade) -> Self {
        Self {
            id: trade.id,
            chain: trade.chain.clone(),
            pair: trade.pair.clone(),
            from_token: trade.from_token.clone(),
            to_token: trade.to_token.clone(),
            amount_usd: trade.amount_usd,
            input_amount: trade.input_amount.clone(),
            winner: trade.verdict.winner.to_string(),
            provider_results_count: trade.results.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetails {
    #[serde(flatten)]
    pub run: RunOverview,
    pub trades: Vec<TradeSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinRatesResponse {
    pub run_id: i64,
    pub run_date: DateTime<Utc>,
    pub chain_filter: Option<String>,
    pub total_trades_analyzed: u64,
    pub provider_analytics: Vec<ProviderStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainPerformanceResponse {
    pub run_id: i64,
    pub run_date: DateTime<Utc>,
    pub chains: BTreeMap<String, ChainPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub output_amount: Option<String>,
    /// Seconds
    pub response_time: f64,
    pub status_code: u16,
    pub error: Option<String>,
}

/// A trade flattened for side-by-side provider comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedResult {
    pub trade_id: i64,
    pub chain: String,
    pub pair: String,
    pub from_token_symbol: String,
    pub to_token_symbol: String,
    pub amount_usd: f64,
    pub input_amount: String,
    pub providers: BTreeMap<String, ProviderOutcome>,
    pub winner: String,
    pub output_diff: Option<f64>,
    pub output_diff_usd: Option<f64>,
}

impl From<StoredTrade> for DetailedResult {
    fn from(trade: StoredTrade) -> Self {
        let providers = trade
            .results
            .into_iter()
            .map(|q| {
                let outcome = ProviderOutcome {
                    output_amount: q.output_amount,
                    response_time: q.elapsed.as_secs_f64(),
                    status_code: q.status_code,
                    error: q.error,
                };
                (q.provider, outcome)
            })
            .collect();

        Self {
            trade_id: trade.id,
            chain: trade.chain,
            pair: trade.pair,
            from_token_symbol: trade.from_token_symbol,
            to_token_symbol: trade.to_token_symbol,
            amount_usd: trade.amount_usd,
            input_amount: trade.input_amount,
            providers,
            winner: trade.verdict.winner.to_string(),
            output_diff: trade.verdict.spread,
            output_diff_usd: trade.verdict.spread_usd,
        }
    }
}
