use std::{sync::Arc, time::Duration};

use color_eyre::eyre::{self, WrapErr as _};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    chain::ChainConfig,
    oracle::DEFAULT_EXCHANGE_RATES_URL,
    provider::{
        GluexConfig, GluexProvider, LiqdswapConfig, LiqdswapProvider, Providers, provider_names,
    },
    registry::DecimalRegistry,
};

pub const CONFIG_FILE: &str = "quotebench.yaml";
pub const ENV_PREFIX: &str = "QUOTEBENCH_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chains to benchmark, in run order
    pub chains: Vec<ChainConfig>,

    /// USD notionals quoted for every pair
    #[serde(default = "default_usd_tiers")]
    pub usd_tiers: Vec<f64>,

    /// Timeout applied to every price and quote request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_exchange_rates_url")]
    pub exchange_rates_url: String,

    /// Address quotes are requested for
    pub user_address: String,

    #[serde(default)]
    pub providers: ProvidersConfig,

    pub database: DatabaseConfig,
}

/// A provider is registered only when its section is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub gluex: Option<GluexConfig>,
    pub liqdswap: Option<LiqdswapConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_usd_tiers() -> Vec<f64> {
    vec![1.0, 10.0, 100.0, 1_000.0, 10_000.0]
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_exchange_rates_url() -> String {
    DEFAULT_EXCHANGE_RATES_URL.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Load configuration from `quotebench.yaml` and `QUOTEBENCH_*` environment
    /// variables. Nested keys are separated by `__`, e.g.
    /// `QUOTEBENCH_PROVIDERS__GLUEX__API_KEY`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(
            Figment::new()
                .merge(Yaml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Instantiates every configured provider.
    pub fn build_providers(&self, decimals: &Arc<DecimalRegistry>) -> eyre::Result<Providers> {
        let mut providers: Providers = Vec::new();

        match &self.providers.gluex {
            Some(gluex) => providers.push(Arc::new(
                GluexProvider::new(
                    gluex.clone(),
                    &self.user_address,
                    Arc::clone(decimals),
                    self.request_timeout(),
                )
                .wrap_err("failed to set up GlueX provider")?,
            )),
            None => warn!("GlueX credentials missing, provider disabled"),
        }

        match &self.providers.liqdswap {
            Some(liqdswap) => providers.push(Arc::new(
                LiqdswapProvider::new(liqdswap.clone(), Arc::clone(decimals), self.request_timeout())
                    .wrap_err("failed to set up Liqdswap provider")?,
            )),
            None => warn!("Liqdswap url missing, provider disabled"),
        }

        info!(
            providers = ?provider_names(&providers),
            "Registered quote providers"
        );
        Ok(providers)
    }
}
