use color_eyre::eyre::Result;
use quotebench_backend::{app, AppState, Config};
use quotebench_core::{
    database::Handle,
    telemetry::{self, init_subscriber},
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_subscriber(telemetry::get_subscriber());

    let config = Config::load()?;
    let handle = Handle::from_config(&config.database)?;
    handle.ensure_schema().await?;

    let state = AppState::new(handle.report_repository());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Quotebench API server running at http://{bind_addr}");

    let mut sigterm = signal(SignalKind::terminate())?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            sigterm.recv().await;
            info!("received SIGTERM, shutting down");
        })
        .await?;

    Ok(())
}
