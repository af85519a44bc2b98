pub mod analytics;
pub mod benchmarks;
pub mod health;
