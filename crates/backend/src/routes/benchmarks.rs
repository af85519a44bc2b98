use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use quotebench_core::{
    database::{RunOverview, TradeFilter},
    trade::RunId,
};
use tracing::info;

use crate::{
    error::ApiError,
    models::{PaginatedResponse, PaginationQuery, RunDetails, TradeSummary},
    state::AppState,
};

/// Stored runs, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<RunOverview>>, ApiError> {
    let (page, page_size) = pagination.sanitize();
    let (offset, limit) = pagination.to_offset_limit();

    info!(page = %page, page_size = %page_size, "Fetching benchmark runs");

    let (total, runs) = tokio::try_join!(
        state.reports.count_runs(),
        state.reports.list_runs(limit, offset)
    )?;

    Ok(Json(PaginatedResponse::new(runs, page, page_size, Some(total))))
}

pub async fn run_details(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RunDetails>, ApiError> {
    let run = state.resolve_run(Some(id)).await?;
    let trades = state
        .reports
        .trades(RunId(run.id), &TradeFilter::default())
        .await?;

    Ok(Json(RunDetails {
        run,
        trades: trades.iter().map(TradeSummary::from).collect(),
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_runs))
        .route("/:id", get(run_details))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt as _;

    use super::*;
    use crate::state::testing::{run, trade, FakeReports};

    fn app() -> Router {
        let reports = FakeReports {
            runs: (1..=3).map(|id| run(id, 1)).collect(),
            trades: vec![trade(10, 2, "999", &[("GlueX", Some("100.2")), ("Liqdswap", None)])],
        };
        routes().with_state(AppState::new(reports))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn lists_runs_newest_first() {
        let (status, body) = get_json("/?page=1&page_size=2").await;

        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(body["pagination"]["total_items"], 3);
        assert_eq!(body["pagination"]["has_next"], true);
    }

    #[tokio::test]
    async fn run_details_include_trades() {
        let (status, body) = get_json("/2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 2);
        assert_eq!(body["trades"][0]["winner"], "GlueX");
        assert_eq!(body["trades"][0]["provider_results_count"], 2);
    }

    #[tokio::test]
    async fn missing_run_is_not_found() {
        let (status, body) = get_json("/42").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Run not found");
    }
}
