use quotebench_core::{config::Config, registry::ChainRegistry};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr as _};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{pairs, quote, run};

#[derive(Parser)]
#[command(name = "quotebench", about, version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark every configured chain once and store the run
    Run(run::Run),

    /// List the trading pairs benchmarked on a chain
    Pairs(pairs::Pairs),

    /// Quote a single trade against every provider without storing it
    Quote(quote::Quote),
}

impl Cli {
    pub(crate) async fn run(self, config: Config, shutdown_token: CancellationToken) -> eyre::Result<()> {
        let registry = Arc::new(
            ChainRegistry::new(config.chains.clone()).wrap_err("invalid chain configuration")?,
        );

        for chain in registry.chains() {
            info!(
                chain.id = %chain.id,
                chain.name = %chain.blockchain,
                tokens = chain.tokens().count(),
                "Loaded chain from config"
            );
        }

        match self.command {
            Commands::Run(cmd) => cmd.run(config, registry, shutdown_token).await,
            Commands::Pairs(cmd) => cmd.run(&registry),
            Commands::Quote(cmd) => cmd.run(config, registry).await,
        }
    }
}
