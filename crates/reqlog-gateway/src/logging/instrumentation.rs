//! Request lifecycle hooks
//!
//! Three calls per request: start (ingress), send (the response is about to be
//! transmitted) and finish (the response is complete). Send and finish may
//! both log for the same request; they serve different readers.

use axum::http::HeaderMap;
use reqlog_core::{LogLevel, Logger, Metadata};
use std::sync::Arc;

use super::render::{headers_to_json, CapturedBody};
use super::RequestContext;

#[derive(Clone)]
pub struct RequestInstrumentation {
    logger: Arc<Logger>,
}

impl RequestInstrumentation {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    /// Log `"<METHOD> <URL>"` with the client IP and start the request timer
    pub async fn on_request_start(
        &self,
        method: &str,
        url: &str,
        client_ip: &str,
    ) -> RequestContext {
        let ctx = RequestContext::new(method, url, client_ip);
        self.logger
            .info(
                format!("{} {}", method, url),
                Metadata::new().with("ip", client_ip),
            )
            .await;
        ctx
    }

    /// Log the outgoing response with latency, headers and body
    pub async fn on_response_send(
        &self,
        ctx: &RequestContext,
        status: u16,
        status_message: &str,
        headers: &HeaderMap,
        body: &CapturedBody,
    ) {
        let metadata = Metadata::new()
            .with("method", &ctx.method)
            .with("url", &ctx.url)
            .with("status", &status)
            .with("statusMessage", status_message)
            .with("durationMs", &ctx.elapsed_ms())
            .with("responseData", &body.to_json())
            .with("responseHeaders", &headers_to_json(headers));

        self.logger.info("Outgoing Response", metadata).await;
    }

    /// Log the terminal status line, at error severity for 4xx and 5xx
    pub async fn on_request_finish(
        &self,
        method: &str,
        url: &str,
        status: u16,
        status_message: &str,
    ) {
        let level = if status >= 400 {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        self.logger
            .log(
                level,
                format!("{} {} {} - {}", method, url, status, status_message),
                None,
            )
            .await;
    }
}
