use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre;
use quotebench_core::{
    analytics::StoredTrade,
    database::{ReportRepository, RunOverview, TradeFilter},
    trade::RunId,
};

use crate::error::ApiError;

/// Read access to stored benchmark runs.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn count_runs(&self) -> eyre::Result<u64>;
    async fn list_runs(&self, limit: u32, offset: u32) -> eyre::Result<Vec<RunOverview>>;
    async fn run(&self, id: RunId) -> eyre::Result<Option<RunOverview>>;
    async fn latest_run_id(&self) -> eyre::Result<Option<RunId>>;
    async fn count_trades(&self, run_id: RunId, chain: Option<&str>) -> eyre::Result<u64>;
    async fn trades(&self, run_id: RunId, filter: &TradeFilter) -> eyre::Result<Vec<StoredTrade>>;
}

#[async_trait]
impl ReportSource for ReportRepository {
    async fn count_runs(&self) -> eyre::Result<u64> {
        ReportRepository::count_runs(self).await
    }

    async fn list_runs(&self, limit: u32, offset: u32) -> eyre::Result<Vec<RunOverview>> {
        ReportRepository::list_runs(self, limit, offset).await
    }

    async fn run(&self, id: RunId) -> eyre::Result<Option<RunOverview>> {
        ReportRepository::run(self, id).await
    }

    async fn latest_run_id(&self) -> eyre::Result<Option<RunId>> {
        ReportRepository::latest_run_id(self).await
    }

    async fn count_trades(&self, run_id: RunId, chain: Option<&str>) -> eyre::Result<u64> {
        ReportRepository::count_trades(self, run_id, chain).await
    }

    async fn trades(&self, run_id: RunId, filter: &TradeFilter) -> eyre::Result<Vec<StoredTrade>> {
        ReportRepository::trades(self, run_id, filter).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<dyn ReportSource>,
}

impl AppState {
    pub fn new(reports: impl ReportSource + 'static) -> Self {
        Self {
            reports: Arc::new(reports),
        }
    }

    /// The requested run, or the most recent one when none is given.
    pub(crate) async fn resolve_run(&self, run_id: Option<i64>) -> Result<RunOverview, ApiError> {
        let id = match run_id {
            Some(id) => RunId(id),
            None => self
                .reports
                .latest_run_id()
                .await?
                .ok_or(ApiError::NotFound("No benchmark runs found"))?,
        };

        self.reports
            .run(id)
            .await?
            .ok_or(ApiError::NotFound("Run not found"))
    }
}
