use std::process::ExitCode;

use clap::Parser as _;
use cli::Cli;
use quotebench_core::{
    config::Config,
    telemetry::{self, init_subscriber},
};
use tokio::{
    select,
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod cli;
mod pairs;
mod quote;
mod run;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporting: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    init_subscriber(telemetry::get_subscriber());

    let shutdown_token = CancellationToken::new();

    let mut command_jh = tokio::spawn(cli.run(config, shutdown_token.clone()));

    let mut sigterm = signal(SignalKind::terminate())
        .expect("setting sigterm listener on unix should always work");
    let mut sigint = signal(SignalKind::interrupt())
        .expect("setting sigint listener on unix should always work");

    // a signal stops new work, the command still stores what it already has
    let result = select! {
        res = &mut command_jh => res,
        _ = sigterm.recv() => {
            info!("received SIGTERM signal");
            shutdown_token.cancel();
            command_jh.await
        }
        _ = sigint.recv() => {
            info!("received SIGINT signal");
            shutdown_token.cancel();
            command_jh.await
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("command completed");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = ?e, "command failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(%e, "command exited unexpectedly");
            ExitCode::FAILURE
        }
    }
}
