use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::eyre::{self, OptionExt as _, WrapErr as _};
use sqlx::{Acquire as _, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, instrument};

use crate::{
    store::{RunStore, RunTransaction},
    trade::{RunId, TradeBenchmark},
};

/// Postgres-backed [`RunStore`]. Each run is one transaction.
#[derive(Clone)]
pub struct PgRunStore {
    pool: Arc<PgPool>,
}

impl PgRunStore {
    pub(super) fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    #[instrument(skip(self))]
    async fn create_run(&self, started_at: DateTime<Utc>) -> eyre::Result<Box<dyn RunTransaction>> {
        let mut tx = self.pool.begin().await.wrap_err("failed to open run transaction")?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO benchmark_runs (start_time) VALUES ($1) RETURNING id",
        )
        .bind(started_at)
        .fetch_one(&mut *tx)
        .await
        .wrap_err("failed to insert benchmark run")?;

        Ok(Box::new(PgRunTransaction {
            id: RunId(id),
            tx: Some(tx),
        }))
    }
}

pub struct PgRunTransaction {
    id: RunId,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgRunTransaction {
    fn tx(&mut self) -> eyre::Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_eyre("run transaction already closed")
    }
}

#[async_trait]
impl RunTransaction for PgRunTransaction {
    fn run_id(&self) -> RunId {
        self.id
    }

    #[instrument(skip_all, fields(run_id = %self.id, trades = trades.len()))]
    async fn attach_trades(&mut self, trades: Vec<TradeBenchmark>) -> eyre::Result<()> {
        let run_id = self.id;
        let tx = self.tx()?;

        // a failed chain only rolls back its own savepoint
        let mut savepoint = (&mut *tx).begin().await.wrap_err("failed to open savepoint")?;
        for trade in &trades {
            insert_trade(&mut savepoint, run_id, trade).await?;
        }
        savepoint.commit().await.wrap_err("failed to release savepoint")?;

        debug!("Attached chain trades");
        Ok(())
    }

    #[instrument(skip(self), fields(run_id = %self.id))]
    async fn finalize(&mut self, ended_at: DateTime<Utc>) -> eyre::Result<()> {
        let id = self.id.0;
        let tx = self.tx()?;

        sqlx::query("UPDATE benchmark_runs SET end_time = $1 WHERE id = $2")
            .bind(ended_at)
            .bind(id)
            .execute(&mut **tx)
            .await
            .wrap_err("failed to set run end time")?;

        self.tx
            .take()
            .ok_or_eyre("run transaction already closed")?
            .commit()
            .await
            .wrap_err("failed to commit benchmark run")
    }

    async fn rollback(self: Box<Self>) -> eyre::Result<()> {
        match self.tx {
            Some(tx) => tx.rollback().await.wrap_err("failed to roll back benchmark run"),
            None => Ok(()),
        }
    }
}

async fn insert_trade(
    tx: &mut Transaction<'_, Postgres>,
    run_id: RunId,
    trade: &TradeBenchmark,
) -> eyre::Result<()> {
    let trade_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO trade_results (
            run_id, chain, pair, from_token, to_token,
            from_token_symbol, to_token_symbol, amount_usd, input_amount,
            winner, output_diff, output_diff_usd
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(run_id.0)
    .bind(trade.chain.as_str())
    .bind(&trade.pair)
    .bind(trade.from_token.as_str())
    .bind(trade.to_token.as_str())
    .bind(&trade.from_token_symbol)
    .bind(&trade.to_token_symbol)
    .bind(trade.amount_usd)
    .bind(&trade.input_amount)
    .bind(trade.verdict.winner.to_string())
    .bind(trade.verdict.spread)
    .bind(trade.verdict.spread_usd)
    .fetch_one(&mut **tx)
    .await
    .wrap_err_with(|| format!("failed to insert trade {}", trade.pair))?;

    if trade.results.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO provider_results \
         (trade_id, provider, output_amount, elapsed_time, status_code, error, raw_response) ",
    );
    builder.push_values(&trade.results, |mut row, result| {
        row.push_bind(trade_id)
            .push_bind(&result.provider)
            .push_bind(&result.output_amount)
            .push_bind(result.elapsed.as_secs_f64())
            .push_bind(i32::from(result.status_code))
            .push_bind(&result.error)
            .push_bind(&result.raw_response);
    });

    builder
        .build()
        .execute(&mut **tx)
        .await
        .wrap_err_with(|| format!("failed to insert provider results for {}", trade.pair))?;

    Ok(())
}
