use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::eyre;

use crate::trade::{RunId, TradeBenchmark};

/// Persists benchmark runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Opens a run. The id is known before anything is committed.
    async fn create_run(&self, started_at: DateTime<Utc>) -> eyre::Result<Box<dyn RunTransaction>>;
}

/// An open run. Nothing is visible to readers until [`RunTransaction::finalize`].
#[async_trait]
pub trait RunTransaction: Send {
    fn run_id(&self) -> RunId;

    /// Stores one chain's trades. On error none of them are kept, earlier
    /// chains are unaffected.
    async fn attach_trades(&mut self, trades: Vec<TradeBenchmark>) -> eyre::Result<()>;

    /// Sets the end time and commits the run.
    async fn finalize(&mut self, ended_at: DateTime<Utc>) -> eyre::Result<()>;

    async fn rollback(self: Box<Self>) -> eyre::Result<()>;
}
