mod config;

use anyhow::{Context, Result};
use config::Config;
use grpc_request_id::RequestIdLayer;
use tonic::transport::Server;
use tonic_health::server::health_reporter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let logging = config
        .logging()
        .context("Failed to load logging configuration")?;
    let _level = logging_config::init_logging(&logging).context("Failed to initialize logging")?;

    tracing::info!("Starting health-service");

    // Check (unary) and Watch (streaming) both get x-request-id / x-response-id
    let (_reporter, health_service) = health_reporter();

    let addr = config.grpc_addr();
    tracing::info!(%addr, "gRPC server listening");

    Server::builder()
        .layer(RequestIdLayer::new())
        .add_service(health_service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("gRPC server failed")?;

    tracing::info!("health-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
