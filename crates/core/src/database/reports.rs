use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{self, WrapErr as _};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::{
    analytics::{StoredQuote, StoredTrade},
    provider::STATUS_INTERNAL,
    trade::RunId,
    winner::{Verdict, Winner},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RunOverview {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub trade_count: i64,
}

/// Which trades of a run to read.
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub chain: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

#[derive(FromRow)]
struct TradeRow {
    id: i64,
    run_id: i64,
    chain: String,
    pair: String,
    from_token: String,
    to_token: String,
    from_token_symbol: String,
    to_token_symbol: String,
    amount_usd: f64,
    input_amount: String,
    winner: String,
    output_diff: Option<f64>,
    output_diff_usd: Option<f64>,
}

#[derive(FromRow)]
struct QuoteRow {
    trade_id: i64,
    provider: String,
    output_amount: Option<String>,
    elapsed_time: f64,
    status_code: i32,
    error: Option<String>,
}

impl From<QuoteRow> for StoredQuote {
    fn from(row: QuoteRow) -> Self {
        Self {
            provider: row.provider,
            output_amount: row.output_amount,
            elapsed: Duration::try_from_secs_f64(row.elapsed_time).unwrap_or_default(),
            status_code: u16::try_from(row.status_code).unwrap_or(STATUS_INTERNAL),
            error: row.error,
        }
    }
}

impl TradeRow {
    fn into_stored(self, results: Vec<StoredQuote>) -> StoredTrade {
        StoredTrade {
            id: self.id,
            run_id: RunId(self.run_id),
            chain: self.chain,
            pair: self.pair,
            from_token: self.from_token,
            to_token: self.to_token,
            from_token_symbol: self.from_token_symbol,
            to_token_symbol: self.to_token_symbol,
            amount_usd: self.amount_usd,
            input_amount: self.input_amount,
            verdict: Verdict {
                winner: Winner::from(self.winner.as_str()),
                spread: self.output_diff,
                spread_usd: self.output_diff_usd,
            },
            results,
        }
    }
}

/// Read side over committed runs.
#[derive(Clone)]
pub struct ReportRepository {
    pool: Arc<PgPool>,
}

impl ReportRepository {
    pub(super) fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn count_runs(&self) -> eyre::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM benchmark_runs")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count as u64)
    }

    /// Runs, newest first.
    #[instrument(skip(self))]
    pub async fn list_runs(&self, limit: u32, offset: u32) -> eyre::Result<Vec<RunOverview>> {
        let runs = sqlx::query_as::<_, RunOverview>(
            r#"
            SELECT r.id, r.start_time, r.end_time, COUNT(t.id) AS trade_count
            FROM benchmark_runs r
            LEFT JOIN trade_results t ON t.run_id = r.id
            GROUP BY r.id
            ORDER BY r.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(self.pool.as_ref())
        .await
        .wrap_err("failed to list benchmark runs")?;

        Ok(runs)
    }

    #[instrument(skip(self))]
    pub async fn run(&self, id: RunId) -> eyre::Result<Option<RunOverview>> {
        let run = sqlx::query_as::<_, RunOverview>(
            r#"
            SELECT r.id, r.start_time, r.end_time, COUNT(t.id) AS trade_count
            FROM benchmark_runs r
            LEFT JOIN trade_results t ON t.run_id = r.id
            WHERE r.id = $1
            GROUP BY r.id
            "#,
        )
        .bind(id.0)
        .fetch_optional(self.pool.as_ref())
        .await
        .wrap_err_with(|| format!("failed to read run {id}"))?;

        Ok(run)
    }

    pub async fn latest_run_id(&self) -> eyre::Result<Option<RunId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM benchmark_runs")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(id.map(RunId))
    }

    pub async fn count_trades(&self, run_id: RunId, chain: Option<&str>) -> eyre::Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trade_results WHERE run_id = $1 AND ($2::TEXT IS NULL OR chain = $2)",
        )
        .bind(run_id.0)
        .bind(chain)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count as u64)
    }

    /// Trades of a run in insertion order, each with its provider results.
    #[instrument(skip(self))]
    pub async fn trades(&self, run_id: RunId, filter: &TradeFilter) -> eyre::Result<Vec<StoredTrade>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT
                id, run_id, chain, pair, from_token, to_token,
                from_token_symbol, to_token_symbol, amount_usd, input_amount,
                winner, output_diff, output_diff_usd
            FROM trade_results
            WHERE run_id = $1 AND ($2::TEXT IS NULL OR chain = $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(run_id.0)
        .bind(filter.chain.as_deref())
        .bind(filter.limit.map(i64::from))
        .bind(filter.offset as i64)
        .fetch_all(self.pool.as_ref())
        .await
        .wrap_err_with(|| format!("failed to read trades of run {run_id}"))?;

        let trade_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let quotes = sqlx::query_as::<_, QuoteRow>(
            r#"
            SELECT trade_id, provider, output_amount, elapsed_time, status_code, error
            FROM provider_results
            WHERE trade_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&trade_ids)
        .fetch_all(self.pool.as_ref())
        .await
        .wrap_err_with(|| format!("failed to read provider results of run {run_id}"))?;

        let mut by_trade: HashMap<i64, Vec<StoredQuote>> = HashMap::new();
        for quote in quotes {
            by_trade.entry(quote.trade_id).or_default().push(quote.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let results = by_trade.remove(&row.id).unwrap_or_default();
                row.into_stored(results)
            })
            .collect())
    }
}
