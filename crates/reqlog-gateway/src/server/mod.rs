//! Gateway Server
//!
//! HTTP server with the request logging stages installed.
//! Self-contained with dependency injection: the logger is built by the
//! caller and handed in.

mod handlers;
pub mod logging_middleware;

pub use handlers::{panic_response, HandlerError, UnhandledError};

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use reqlog_core::Logger;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::logging::{ErrorReporter, RequestInstrumentation};

/// Default port for the gateway
pub const DEFAULT_PORT: u16 = 3000;

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl GatewayConfig {
    /// Get the socket address
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid address {}:{}", self.host, self.port))
    }
}

/// Hooks shared by the logging middleware stages
#[derive(Clone)]
pub struct LoggingHooks {
    pub instrumentation: RequestInstrumentation,
    pub reporter: ErrorReporter,
}

impl LoggingHooks {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            instrumentation: RequestInstrumentation::new(logger.clone()),
            reporter: ErrorReporter::new(logger),
        }
    }
}

/// Install the request logging stages around `router`
///
/// Layer order, outermost first: finish line, ingress/egress, error
/// reporting, panic capture, then the routes.
pub fn with_request_logging(router: Router, logger: Arc<Logger>) -> Router {
    let hooks = LoggingHooks::new(logger);

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(
            hooks.clone(),
            logging_middleware::error_reporting_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            hooks.clone(),
            logging_middleware::request_logging_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            hooks,
            logging_middleware::response_finish_middleware,
        ))
}

/// Standalone gateway
pub struct GatewayServer {
    config: GatewayConfig,
    logger: Arc<Logger>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, logger: Arc<Logger>) -> Self {
        Self { config, logger }
    }

    /// Built-in routes wrapped in the logging stages
    pub fn build_router(&self) -> Router {
        let routes = Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status));

        with_request_logging(routes, self.logger.clone()).layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = self.config.addr()?;
        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("[Gateway] Listening on {}", addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

        info!("[Gateway] Stopped");
        Ok(())
    }
}
