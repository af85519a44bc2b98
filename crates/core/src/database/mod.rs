use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr as _, eyre};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

pub use reports::*;
pub use runs::*;

mod reports;
mod runs;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS benchmark_runs (
        id BIGSERIAL PRIMARY KEY,
        start_time TIMESTAMPTZ NOT NULL,
        end_time TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trade_results (
        id BIGSERIAL PRIMARY KEY,
        run_id BIGINT NOT NULL REFERENCES benchmark_runs (id) ON DELETE CASCADE,
        chain TEXT NOT NULL,
        pair TEXT NOT NULL,
        from_token TEXT NOT NULL,
        to_token TEXT NOT NULL,
        from_token_symbol TEXT NOT NULL,
        to_token_symbol TEXT NOT NULL,
        amount_usd DOUBLE PRECISION NOT NULL,
        input_amount TEXT NOT NULL,
        winner TEXT NOT NULL,
        output_diff DOUBLE PRECISION,
        output_diff_usd DOUBLE PRECISION
    )
    "#,
    "CREATE INDEX IF NOT EXISTS trade_results_run_chain_idx ON trade_results (run_id, chain)",
    r#"
    CREATE TABLE IF NOT EXISTS provider_results (
        id BIGSERIAL PRIMARY KEY,
        trade_id BIGINT NOT NULL REFERENCES trade_results (id) ON DELETE CASCADE,
        provider TEXT NOT NULL,
        output_amount TEXT,
        elapsed_time DOUBLE PRECISION NOT NULL,
        status_code INTEGER NOT NULL,
        error TEXT,
        raw_response JSONB
    )
    "#,
    "CREATE INDEX IF NOT EXISTS provider_results_trade_idx ON provider_results (trade_id)",
];

pub struct Handle {
    pool: Arc<PgPool>,
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl Handle {
    /// Creates a lazily connecting pool.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout())
            .idle_timeout(config.idle_timeout())
            .connect_lazy(&config.url)
            .map_err(|e| eyre!("Failed to set up database pool: {}", e))?;

        info!(
            max_connections = config.max_connections,
            "Configured database pool"
        );

        Ok(Handle {
            pool: Arc::new(pool),
        })
    }

    /// Creates the benchmark tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(self.pool.as_ref())
                .await
                .wrap_err("failed to create benchmark schema")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    pub fn run_store(&self) -> PgRunStore {
        PgRunStore::new(Arc::clone(&self.pool))
    }

    pub fn report_repository(&self) -> ReportRepository {
        ReportRepository::new(Arc::clone(&self.pool))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn config(max_connections: u32) -> DatabaseConfig {
        DatabaseConfig {
            url: "postgres://bench@localhost/bench".to_string(),
            max_connections,
            connection_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }

    #[tokio::test]
    async fn builds_lazy_pool_without_connecting() {
        let handle = Handle::from_config(&config(10)).unwrap();
        assert_eq!(handle.pool().options().get_max_connections(), 10);
        assert_eq!(handle.pool().size(), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_url() {
        let mut config = config(1);
        config.url = "not a url".to_string();
        assert!(Handle::from_config(&config).is_err());
    }

    #[test]
    fn schema_is_idempotent() {
        assert!(SCHEMA.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    proptest! {
        #[test]
        fn pool_respects_max_connections(max_connections in 1u32..=100) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let _guard = runtime.enter();

            let handle = Handle::from_config(&config(max_connections)).unwrap();
            prop_assert_eq!(handle.pool().options().get_max_connections(), max_connections);
        }
    }
}
