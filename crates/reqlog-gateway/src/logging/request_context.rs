//! Request context - per-request identity and timing
//!
//! Created by the ingress hook and carried to the egress hook.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info_span, Span};

/// Global request counter for request ID generation
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a short request ID (6 hex characters)
pub fn generate_request_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);

    let mixed = counter.wrapping_add(timestamp);
    format!("{:06x}", mixed & 0xFFFFFF)
}

/// State captured at ingress
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    /// Original URL including the query string
    pub url: String,
    pub client_ip: String,
    pub started_at: Instant,
}

impl RequestContext {
    pub fn new(method: &str, url: &str, client_ip: &str) -> Self {
        Self {
            request_id: generate_request_id(),
            method: method.to_string(),
            url: url.to_string(),
            client_ip: client_ip.to_string(),
            started_at: Instant::now(),
        }
    }

    /// Wall-clock milliseconds since ingress
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Diagnostic span helpers
pub struct RequestSpan;

impl RequestSpan {
    /// Span carrying the request id for all diagnostics emitted inside it
    pub fn enter(ctx: &RequestContext) -> Span {
        info_span!(
            "request",
            request_id = %ctx.request_id,
            method = %ctx.method,
            url = %ctx.url,
        )
    }

    pub fn log_exit(ctx: &RequestContext, status: u16) {
        debug!(
            request_id = %ctx.request_id,
            "← {} ({}ms)",
            status,
            ctx.elapsed_ms()
        );
    }
}
