//! HTTP Request/Response Logging Middleware
//!
//! Three stages, outermost first:
//! - `response_finish_middleware`: terminal status line once the response is done
//! - `request_logging_middleware`: ingress line, then the outgoing response with
//!   latency, headers and body
//! - `error_reporting_middleware`: logs unhandled handler failures with the
//!   request context and swaps in the generic failure response

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use tracing::{debug, warn, Instrument};

use super::handlers::UnhandledError;
use super::LoggingHooks;
use crate::logging::render::MAX_BODY_LOG_SIZE;
use crate::logging::{CapturedBody, RequestSpan};

/// Path plus query string, as the client sent it
fn original_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Peer address from `ConnectInfo`, or `-` when the server was not started with it
fn client_ip(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn status_message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// Read `body` for logging when it announces a length within the log limit
///
/// Any other body is handed back untouched so the handler's own limits and
/// streaming still apply.
async fn capture_body(body: Body) -> Result<(Body, CapturedBody), axum::Error> {
    match HttpBody::size_hint(&body).exact() {
        Some(len) if len <= MAX_BODY_LOG_SIZE as u64 => {
            let bytes = body.collect().await?.to_bytes();
            Ok((Body::from(bytes.clone()), CapturedBody::Buffered(bytes)))
        }
        len => Ok((body, CapturedBody::Skipped(len))),
    }
}

/// Ingress and egress logging
///
/// The handler chain runs exactly once. A response body of known, small
/// length is buffered so it can be logged; larger or streamed bodies are
/// summarized and passed through as they are.
pub async fn request_logging_middleware(
    State(hooks): State<LoggingHooks>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let url = original_url(request.uri());
    let ip = client_ip(&request);

    let ctx = hooks
        .instrumentation
        .on_request_start(&method, &url, &ip)
        .await;
    let span = RequestSpan::enter(&ctx);

    async move {
        let response = next.run(request).await;

        let (parts, body) = response.into_parts();
        let (body, captured) = match capture_body(body).await {
            Ok(captured) => captured,
            Err(e) => {
                warn!(request_id = %ctx.request_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        hooks
            .instrumentation
            .on_response_send(
                &ctx,
                parts.status.as_u16(),
                status_message(parts.status),
                &parts.headers,
                &captured,
            )
            .await;
        RequestSpan::log_exit(&ctx, parts.status.as_u16());

        Ok(Response::from_parts(parts, body))
    }
    .instrument(span)
    .await
}

/// Terminal status line for every completed request
pub async fn response_finish_middleware(
    State(hooks): State<LoggingHooks>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let url = original_url(request.uri());

    let response = next.run(request).await;
    let status = response.status();
    hooks
        .instrumentation
        .on_request_finish(&method, &url, status.as_u16(), status_message(status))
        .await;

    response
}

/// Report failures that handlers returned as [`UnhandledError`]
///
/// A small request body is buffered up front so it can be attached to the
/// report.
pub async fn error_reporting_middleware(
    State(hooks): State<LoggingHooks>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let url = original_url(request.uri());
    let query = request.uri().query().map(String::from);
    let headers = request.headers().clone();

    let (parts, body) = request.into_parts();
    let (body, captured) = match capture_body(body).await {
        Ok(captured) => captured,
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };
    let request = Request::from_parts(parts, body);

    let response = next.run(request).await;

    let Some(UnhandledError(error)) = response.extensions().get::<UnhandledError>().cloned()
    else {
        return Ok(response);
    };

    debug!("Reporting unhandled error for {} {}", method, url);
    let failure = hooks
        .reporter
        .on_unhandled_error(
            &error,
            &method,
            &url,
            &headers,
            &captured,
            query.as_deref(),
        )
        .await;
    Ok(failure.into_response())
}
