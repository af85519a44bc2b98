mod config;
mod error;
mod models;
mod routes;
mod state;

use axum::Router;
use tower_http::cors::CorsLayer;

pub use config::{Config, ServerConfig};
pub use error::ApiError;
pub use models::*;
pub use state::{AppState, ReportSource};

use crate::routes::{analytics, benchmarks, health};

/// The full read API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::routes())
        .nest("/benchmarks", benchmarks::routes())
        .nest("/analytics", analytics::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
