//! Error reporter - last stop for failures raised while handling a request
//!
//! Everything about the failure goes to the logs; the client only ever sees
//! the fixed generic response.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use reqlog_core::{Logger, Metadata};
use std::sync::Arc;

use super::render::{headers_to_json, query_to_json, CapturedBody};

/// Body sent to the client for any unhandled failure
pub const FAILURE_BODY: &str = "Something broke!";

/// The fixed response returned after an unhandled failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureResponse {
    pub status: StatusCode,
    pub body: &'static str,
}

impl Default for FailureResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: FAILURE_BODY,
        }
    }
}

impl IntoResponse for FailureResponse {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

#[derive(Clone)]
pub struct ErrorReporter {
    logger: Arc<Logger>,
}

impl ErrorReporter {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    /// Log the failure with the full request context and return the generic
    /// failure response
    pub async fn on_unhandled_error(
        &self,
        error: &anyhow::Error,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        body: &CapturedBody,
        query: Option<&str>,
    ) -> FailureResponse {
        let metadata = Metadata::new()
            .with_error(error)
            .with("method", method)
            .with("url", url)
            .with("headers", &headers_to_json(headers))
            .with("body", &body.to_json())
            .with("query", &query_to_json(query));

        self.logger.error("Unhandled Error", metadata).await;
        FailureResponse::default()
    }
}
