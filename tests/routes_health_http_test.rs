// ABOUTME: HTTP integration tests for health, readiness and attachment store routes
// ABOUTME: Exercises the assembled router without running a server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::body::to_bytes;
use axum::http::{header, StatusCode};
use common::{assert_error, get, json_body, TestServer};
use event_relay_server::attachments::{AttachmentStore, LocalAttachmentStore};
use event_relay_server::config::ServerConfig;
use event_relay_server::resources::ServerResources;
use event_relay_server::routes::build_router;
use std::sync::Arc;

// ============================================================================
// GET /health and /ready
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new();
    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "event-relay-server");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_ready_with_source() {
    let server = TestServer::new();
    server
        .resources
        .cache
        .store_bytes("text/plain", b"warm")
        .unwrap();

    let response = server.get("/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["event_source"], true);
    assert_eq!(body["checks"]["attachment_store"], false);
    assert_eq!(body["cache"]["byte_entries"], 1);
    assert_eq!(body["cache"]["stored_bytes"], 4);
}

#[tokio::test]
async fn test_ready_without_source() {
    common::init_test_logging();
    let resources = Arc::new(ServerResources::with_parts(
        ServerConfig::default(),
        None,
        None,
    ));
    let response = get(build_router(&resources), "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "not_ready");

    // Liveness does not depend on the source
    let response = get(build_router(&resources), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// GET /api/attachments/{file}
// ============================================================================

fn store_router(store: Arc<LocalAttachmentStore>) -> axum::Router {
    common::init_test_logging();
    let resources = Arc::new(ServerResources::with_parts(
        ServerConfig::default(),
        None,
        Some(store),
    ));
    build_router(&resources)
}

#[tokio::test]
async fn test_attachment_route_serves_stored_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalAttachmentStore::new(dir.path()).unwrap());
    let uri = store
        .store_bytes("chart.png", "image/png", &[0x89, b'P', b'N', b'G'])
        .unwrap();
    assert!(uri.starts_with("/api/attachments/"));

    let response = get(store_router(store), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_attachment_route_unknown_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalAttachmentStore::new(dir.path()).unwrap());
    assert_error(
        get(store_router(store), "/api/attachments/missing.txt").await,
        StatusCode::NOT_FOUND,
        "RESOURCE_NOT_FOUND",
    )
    .await;
}

#[tokio::test]
async fn test_attachment_route_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalAttachmentStore::new(dir.path()).unwrap());
    assert_error(
        get(store_router(store), "/api/attachments/..%2Fetc%2Fpasswd").await,
        StatusCode::BAD_REQUEST,
        "INVALID_INPUT",
    )
    .await;
}

#[tokio::test]
async fn test_attachment_route_absent_without_store() {
    let server = TestServer::new();
    let response = server.get("/api/attachments/anything.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
