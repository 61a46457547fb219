//! Reqlog Server
//!
//! Runs the gateway with access, detail and level request logs and the
//! midnight rotation task.

use anyhow::Context;
use reqlog_core::{Logger, RotationScheduler, SystemClock};
use reqlog_gateway::GatewayServer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;

use config::ServerConfig;

/// Initialize diagnostics for the process itself
///
/// These are the pipeline's own messages (rotation, dropped writes, startup);
/// request logs go to the channel files.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqlog_core=info,reqlog_gateway=info,tower_http=warn"));

    let console_layer = fmt::layer()
        .with_writer(stdout)
        .with_ansi(true)
        .compact()
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();

    // Must be kept alive for the duration of the program
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();
    let _guard = init_tracing();

    let config = ServerConfig::from_env();
    info!("[Server] Starting with {:?}", config);

    let logger = Arc::new(
        Logger::init(config.logs.clone(), Arc::new(SystemClock))
            .await
            .context("Failed to open log channels")?,
    );

    let shutdown = CancellationToken::new();
    let scheduler = RotationScheduler::new(logger.clone()).spawn(shutdown.clone());

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[Server] Failed to listen for Ctrl-C: {}", e);
        }
        info!("[Server] Shutdown requested");
        ctrl_c.cancel();
    });

    let result = GatewayServer::new(config.gateway, logger.clone())
        .run(shutdown.clone())
        .await;

    shutdown.cancel();
    if let Err(e) = scheduler.await {
        warn!("[Server] Rotation task ended abnormally: {}", e);
    }
    logger.shutdown().await;

    result
}
