pub mod amount;
pub mod analytics;
pub mod chain;
pub mod config;
pub mod controller;
pub mod database;
pub mod error;
pub mod oracle;
pub mod orchestrator;
pub mod pair;
pub mod provider;
pub mod registry;
pub mod store;
pub mod telemetry;
pub mod trade;
pub mod winner;
