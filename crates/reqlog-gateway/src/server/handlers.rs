//! Built-in routes and the handler error type

use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;

use crate::logging::FailureResponse;

/// Health check
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Plain liveness probe
pub async fn status() -> &'static str {
    "OK"
}

/// Error raised by a handler that it does not handle itself
///
/// Converts into the generic failure response and carries the cause in the
/// response extensions for the error reporting stage to pick up.
#[derive(Debug)]
pub struct HandlerError(pub anyhow::Error);

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let mut response = FailureResponse::default().into_response();
        response
            .extensions_mut()
            .insert(UnhandledError(Arc::new(self.0)));
        response
    }
}

/// Unhandled failure attached to a response
#[derive(Debug, Clone)]
pub struct UnhandledError(pub Arc<anyhow::Error>);

/// Turn a handler panic into an unhandled error
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    HandlerError(anyhow::anyhow!("handler panicked: {}", message)).into_response()
}
