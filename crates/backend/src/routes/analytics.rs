//! Provider comparisons over one stored run.
//!
//! Every endpoint reads the run named by `run_id`, falling back to the latest
//! run, and answers 404 when there is none.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use quotebench_core::{
    analytics::{chain_performance, win_rates},
    database::TradeFilter,
    trade::RunId,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::ApiError,
    models::{
        deserialize_optional, ChainPerformanceResponse, DetailedResult, PaginatedResponse,
        PaginationQuery, WinRatesResponse,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    #[serde(deserialize_with = "deserialize_optional", default)]
    pub run_id: Option<i64>,
    pub chain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailedResultsQuery {
    #[serde(flatten)]
    pub run: RunQuery,
    #[serde(flatten)]
    pub pagination: PaginationQuery,
}

pub async fn get_win_rates(
    State(state): State<AppState>,
    Query(params): Query<RunQuery>,
) -> Result<Json<WinRatesResponse>, ApiError> {
    let run = state.resolve_run(params.run_id).await?;
    info!(run_id = run.id, chain = ?params.chain, "Computing win rates");

    let filter = TradeFilter {
        chain: params.chain.clone(),
        ..TradeFilter::default()
    };
    let trades = state.reports.trades(RunId(run.id), &filter).await?;
    let rates = win_rates(&trades);

    Ok(Json(WinRatesResponse {
        run_id: run.id,
        run_date: run.start_time,
        chain_filter: params.chain,
        total_trades_analyzed: rates.total_trades_analyzed,
        provider_analytics: rates.providers,
    }))
}

pub async fn get_chain_performance(
    State(state): State<AppState>,
    Query(params): Query<RunQuery>,
) -> Result<Json<ChainPerformanceResponse>, ApiError> {
    let run = state.resolve_run(params.run_id).await?;
    let trades = state
        .reports
        .trades(RunId(run.id), &TradeFilter::default())
        .await?;

    Ok(Json(ChainPerformanceResponse {
        run_id: run.id,
        run_date: run.start_time,
        chains: chain_performance(&trades),
    }))
}

pub async fn get_detailed_results(
    State(state): State<AppState>,
    Query(params): Query<DetailedResultsQuery>,
) -> Result<Json<PaginatedResponse<DetailedResult>>, ApiError> {
    let (page, page_size) = params.pagination.sanitize();
    let (offset, limit) = params.pagination.to_offset_limit();

    let run = state.resolve_run(params.run.run_id).await?;
    let run_id = RunId(run.id);
    let chain = params.run.chain;
    info!(%run_id, chain = ?chain, page = %page, page_size = %page_size, "Fetching detailed results");

    let filter = TradeFilter {
        chain: chain.clone(),
        limit: Some(limit),
        offset,
    };
    let (total, trades) = tokio::try_join!(
        state.reports.count_trades(run_id, chain.as_deref()),
        state.reports.trades(run_id, &filter)
    )?;

    let rows = trades.into_iter().map(DetailedResult::from).collect();
    Ok(Json(PaginatedResponse::new(rows, page, page_size, Some(total))))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/win-rates", get(get_win_rates))
        .route("/chain-performance", get(get_chain_performance))
        .route("/detailed-results", get(get_detailed_results))
}
