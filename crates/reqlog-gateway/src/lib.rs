//! Reqlog Gateway
//!
//! HTTP side of the logging pipeline:
//! - Ingress, egress and finish hooks for every request
//! - Error reporting with full request context and a generic 500
//! - Axum middleware stages that drive the hooks
//! - A small standalone server

pub mod logging;
pub mod server;

pub use logging::{
    CapturedBody, ErrorReporter, FailureResponse, RequestContext, RequestInstrumentation,
    RequestSpan, FAILURE_BODY,
};
pub use server::{
    with_request_logging, GatewayConfig, GatewayServer, HandlerError, LoggingHooks,
    UnhandledError,
};
