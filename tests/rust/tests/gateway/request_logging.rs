//! Ingress, egress and finish lines for successful and failed requests

use axum::{
    body::{Body, Bytes},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use reqlog_core::ChannelKind;
use reqlog_gateway::{with_request_logging, GatewayConfig, GatewayServer};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tests::fixtures::TestLogger;
use tests::lines::{detail_metadata, without_timestamp};

use super::{request, send};

fn messages(lines: &[String]) -> Vec<&str> {
    lines.iter().map(|l| without_timestamp(l)).collect()
}

#[tokio::test]
async fn test_successful_request_logs_on_every_channel() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route("/status", get(|| async { "OK" })),
        t.logger.clone(),
    );

    let (response, body) = send(router, request("GET", "/status", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "OK");

    for kind in [ChannelKind::Access, ChannelKind::Level] {
        assert_eq!(
            messages(&t.lines(kind).await),
            vec![
                "INFO: GET /status",
                "INFO: Outgoing Response",
                "INFO: GET /status 200 - OK",
            ]
        );
    }

    let detail = t.lines(ChannelKind::Detail).await;
    assert_eq!(detail.len(), 3);
    assert_eq!(detail_metadata(&detail[0]), Some(json!({"ip": "10.0.0.5"})));

    let egress = detail_metadata(&detail[1]).expect("egress metadata");
    assert_eq!(egress["method"], "GET");
    assert_eq!(egress["url"], "/status");
    assert_eq!(egress["status"], 200);
    assert_eq!(egress["statusMessage"], "OK");
    assert_eq!(egress["responseData"], "OK");
    assert!(egress["durationMs"].is_u64());
    assert_eq!(
        egress["responseHeaders"]["content-type"],
        "text/plain; charset=utf-8"
    );

    assert_eq!(
        without_timestamp(&detail[2]),
        "INFO: GET /status 200 - OK"
    );
}

#[tokio::test]
async fn test_not_found_finish_line_is_error() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route("/status", get(|| async { StatusCode::NOT_FOUND })),
        t.logger.clone(),
    );

    let (response, _) = send(router, request("GET", "/status", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for kind in ChannelKind::ALL {
        let lines = t.lines(kind).await;
        assert_eq!(
            without_timestamp(lines.last().expect("finish line")),
            "ERROR: GET /status 404 - Not Found"
        );
    }

    let detail = t.lines(ChannelKind::Detail).await;
    let egress = detail_metadata(&detail[1]).expect("egress metadata");
    assert_eq!(egress["status"], 404);
    assert_eq!(egress["statusMessage"], "Not Found");
    assert_eq!(egress["responseData"], "");
}

#[tokio::test]
async fn test_json_response_and_query_are_logged() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route(
            "/items",
            post(|| async { (StatusCode::CREATED, Json(json!({"id": 7}))) }),
        ),
        t.logger.clone(),
    );

    let (response, body) = send(router, request("POST", "/items?draft=1", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body, r#"{"id":7}"#);

    let access = t.lines(ChannelKind::Access).await;
    assert_eq!(without_timestamp(&access[0]), "INFO: POST /items?draft=1");
    assert_eq!(
        without_timestamp(&access[2]),
        "INFO: POST /items?draft=1 201 - Created"
    );

    let detail = t.lines(ChannelKind::Detail).await;
    let egress = detail_metadata(&detail[1]).expect("egress metadata");
    assert_eq!(egress["url"], "/items?draft=1");
    assert_eq!(egress["responseData"], json!({"id": 7}));
    assert_eq!(egress["responseHeaders"]["content-type"], "application/json");
}

#[tokio::test]
async fn test_missing_connect_info_logs_dash() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route("/status", get(|| async { "OK" })),
        t.logger.clone(),
    );
    let req = axum::http::Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();

    send(router, req).await;

    let detail = t.lines(ChannelKind::Detail).await;
    assert_eq!(detail_metadata(&detail[0]), Some(json!({"ip": "-"})));
}

#[tokio::test]
async fn test_builtin_routes() {
    let t = TestLogger::new().await;
    let server = GatewayServer::new(GatewayConfig::default(), t.logger.clone());

    let (response, body) = send(
        server.build_router(),
        request("GET", "/health", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);

    let (_, body) = send(
        server.build_router(),
        request("GET", "/status", Body::empty()),
    )
    .await;
    assert_eq!(body, "OK");

    let detail = t.lines(ChannelKind::Detail).await;
    assert_eq!(detail.len(), 6);
    let egress = detail_metadata(&detail[1]).expect("egress metadata");
    assert_eq!(egress["responseData"], json!({"status": "ok"}));
}

#[tokio::test]
async fn test_streamed_upload_is_not_buffered() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route("/upload", post(|body: Bytes| async move { body.len().to_string() })),
        t.logger.clone(),
    );

    // 64 chunks of 1 MiB against the extractor's 2 MiB default limit
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let chunks = futures::stream::iter(0..64).map(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 1024 * 1024]))
    });

    let (response, _) = send(router, request("POST", "/upload", Body::from_stream(chunks))).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(
        pulled.load(Ordering::SeqCst) < 8,
        "pulled {} chunks",
        pulled.load(Ordering::SeqCst)
    );

    let access = t.lines(ChannelKind::Access).await;
    assert_eq!(
        without_timestamp(access.last().expect("finish line")),
        "ERROR: POST /upload 413 - Payload Too Large"
    );
}

#[tokio::test]
async fn test_streamed_response_passes_through() {
    let t = TestLogger::new().await;
    let router = with_request_logging(
        Router::new().route(
            "/export",
            get(|| async {
                let rows = futures::stream::iter(["id,name\n", "1,widget\n"])
                    .map(|row| Ok::<_, std::io::Error>(Bytes::from(row)));
                Body::from_stream(rows)
            }),
        ),
        t.logger.clone(),
    );

    let (response, body) = send(router, request("GET", "/export", Body::empty())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "id,name\n1,widget\n");

    let detail = t.lines(ChannelKind::Detail).await;
    let egress = detail_metadata(&detail[1]).expect("egress metadata");
    assert_eq!(egress["responseData"], "[streamed]");
}
