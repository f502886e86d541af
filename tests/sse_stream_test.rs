// ABOUTME: HTTP integration tests for the SSE streaming endpoint and the share view
// ABOUTME: Covers connected frames, replay/live dedup, visibility rules and request validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use axum::http::{header, StatusCode};
use common::{
    assert_error, json_body, node_event, workflow_event, SseReader, TestServer, FRAME_WAIT,
    QUIET_WAIT,
};
use event_relay_server::config::ServerConfig;
use event_relay_server::events::{
    types, AgentEvent, AgentLevel, EventMeta, SubtaskEvent, SubtaskMetadata, WorkflowEvent,
};
use event_relay_server::publisher::EventSource;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ============================================================================
// Connection setup
// ============================================================================

#[tokio::test]
async fn test_stream_headers_and_connected_frame() {
    let server = TestServer::new();

    let response = server.get("/api/sse?session_id=s1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut reader = SseReader::new(response);
    let connected = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(connected.event, "connected");
    assert_eq!(connected.data["session_id"], "s1");
    assert_eq!(connected.data["active_run_id"], "");
}

#[tokio::test]
async fn test_connected_frame_reports_active_run() {
    let server = TestServer::new();
    server.broadcaster.set_active_run("s1", "run-7").await;

    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    let connected = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(connected.data["active_run_id"], "run-7");

    server.broadcaster.clear_active_run("s1").await;
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    let connected = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(connected.data["active_run_id"], "");
}

// ============================================================================
// Replay and live delivery
// ============================================================================

#[tokio::test]
async fn test_replay_then_live_without_duplicates() {
    let server = TestServer::new();
    let first = workflow_event("s1", "r1", 1, types::NODE_STARTED, json!({}));
    let second = workflow_event("s1", "r1", 2, types::NODE_OUTPUT_DELTA, json!({"delta": "hi"}));
    server.publish(first).await;
    server.publish(second.clone()).await;

    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    assert_eq!(reader.next_frame(FRAME_WAIT).await.unwrap().event, "connected");

    // The live feed re-delivers an already replayed event
    server.publish(second).await;
    server
        .publish(workflow_event("s1", "r1", 3, types::NODE_COMPLETED, json!({})))
        .await;

    let frames = reader.drain(QUIET_WAIT).await;
    let seqs: Vec<(String, String)> = frames
        .iter()
        .map(|f| (f.event.clone(), f.data["run_id"].as_str().unwrap().to_owned()))
        .collect();
    assert_eq!(
        seqs,
        vec![
            (types::NODE_STARTED.to_owned(), "r1".to_owned()),
            (types::NODE_OUTPUT_DELTA.to_owned(), "r1".to_owned()),
            (types::NODE_COMPLETED.to_owned(), "r1".to_owned()),
        ]
    );
}

#[tokio::test]
async fn test_replay_none_skips_history() {
    let server = TestServer::new();
    server
        .publish(workflow_event("s1", "r1", 1, types::NODE_STARTED, json!({})))
        .await;

    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1&replay=none").await);
    assert_eq!(reader.next_frame(FRAME_WAIT).await.unwrap().event, "connected");
    assert!(reader.next_frame(QUIET_WAIT).await.is_none());

    server
        .publish(workflow_event("s1", "r1", 2, types::NODE_COMPLETED, json!({})))
        .await;
    let live = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(live.event, types::NODE_COMPLETED);
}

#[tokio::test]
async fn test_frame_fields() {
    let server = TestServer::new();
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();

    server
        .publish(node_event(
            "s1",
            "r1",
            1,
            types::NODE_STARTED,
            "plan",
            "step",
            json!({"detail": "go"}),
        ))
        .await;

    let frame = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(frame.data["event_type"], types::NODE_STARTED);
    assert_eq!(frame.data["session_id"], "s1");
    assert_eq!(frame.data["run_id"], "r1");
    assert_eq!(frame.data["parent_run_id"], "");
    assert_eq!(frame.data["agent_level"], "core");
    assert_eq!(frame.data["node_id"], "plan");
    assert_eq!(frame.data["node_kind"], "step");
    assert_eq!(frame.data["is_subtask"], false);
    assert_eq!(frame.data["payload"]["detail"], "go");
    let timestamp = frame.data["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_delegated_run_fields() {
    let server = TestServer::new();
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();

    let meta = EventMeta::new("s1", "child-run")
        .with_seq(1)
        .with_parent_run("parent-run")
        .with_agent_level(AgentLevel::Subagent);
    server
        .publish(WorkflowEvent::new(meta, types::NODE_STARTED).into())
        .await;

    let frame = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(frame.data["run_id"], "child-run");
    assert_eq!(frame.data["parent_run_id"], "parent-run");
    assert_eq!(frame.data["agent_level"], "subagent");
}

#[tokio::test]
async fn test_subtask_fields_are_flattened() {
    let server = TestServer::new();
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();

    let inner = workflow_event("s1", "child", 1, types::NODE_STARTED, json!({}));
    let wrapped = AgentEvent::Subtask(SubtaskEvent::new(
        inner,
        SubtaskMetadata {
            index: 2,
            total: 3,
            preview: "check sources".to_owned(),
            max_parallel: 2,
        },
    ));
    server.publish(wrapped).await;

    let frame = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(frame.event, types::NODE_STARTED);
    assert_eq!(frame.data["is_subtask"], true);
    assert_eq!(frame.data["subtask_index"], 2);
    assert_eq!(frame.data["total_subtasks"], 3);
    assert_eq!(frame.data["subtask_preview"], "check sources");
    assert_eq!(frame.data["max_parallel"], 2);
}

#[tokio::test]
async fn test_final_answer_streams_deltas() {
    let server = TestServer::new();
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();

    server
        .publish(workflow_event(
            "s1",
            "r1",
            1,
            types::RESULT_FINAL,
            json!({"final_answer": "Hello", "is_streaming": true}),
        ))
        .await;
    server
        .publish(workflow_event(
            "s1",
            "r1",
            2,
            types::RESULT_FINAL,
            json!({"final_answer": "Hello world", "stream_finished": true}),
        ))
        .await;

    let first = reader.next_frame(FRAME_WAIT).await.unwrap();
    let second = reader.next_frame(FRAME_WAIT).await.unwrap();
    assert_eq!(first.data["payload"]["final_answer"], "Hello");
    assert_eq!(second.data["payload"]["final_answer"], " world");
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_debug_events_require_flag() {
    let server = TestServer::new();
    server
        .publish(workflow_event(
            "s1",
            "r1",
            1,
            types::DIAGNOSTIC_CONTEXT_COMPRESSION,
            json!({}),
        ))
        .await;
    server
        .publish(workflow_event("s1", "r1", 2, types::LIFECYCLE_UPDATED, json!({})))
        .await;
    server
        .publish(workflow_event("s1", "r1", 3, types::NODE_STARTED, json!({})))
        .await;

    let mut plain = SseReader::new(server.get("/api/sse?session_id=s1").await);
    plain.next_frame(FRAME_WAIT).await.unwrap();
    let events: Vec<String> = plain
        .drain(QUIET_WAIT)
        .await
        .into_iter()
        .map(|f| f.event)
        .collect();
    assert_eq!(events, vec![types::NODE_STARTED.to_owned()]);

    let mut debug = SseReader::new(server.get("/api/sse?session_id=s1&debug=TRUE").await);
    debug.next_frame(FRAME_WAIT).await.unwrap();
    let events: Vec<String> = debug
        .drain(QUIET_WAIT)
        .await
        .into_iter()
        .map(|f| f.event)
        .collect();
    assert_eq!(
        events,
        vec![
            types::DIAGNOSTIC_CONTEXT_COMPRESSION.to_owned(),
            types::NODE_STARTED.to_owned(),
        ]
    );
}

#[tokio::test]
async fn test_delegation_progress_is_dropped_live() {
    let server = TestServer::new();
    for (seq, event_type) in [
        types::TOOL_STARTED,
        types::TOOL_PROGRESS,
        types::TOOL_COMPLETED,
    ]
    .into_iter()
    .enumerate()
    {
        server
            .publish(workflow_event(
                "s1",
                "r1",
                seq as u64 + 1,
                event_type,
                json!({"tool_name": "subagent"}),
            ))
            .await;
    }

    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();
    let events: Vec<String> = reader
        .drain(QUIET_WAIT)
        .await
        .into_iter()
        .map(|f| f.event)
        .collect();
    assert_eq!(
        events,
        vec![types::TOOL_STARTED.to_owned(), types::TOOL_COMPLETED.to_owned()]
    );
}

// ============================================================================
// Request validation
// ============================================================================

#[tokio::test]
async fn test_missing_session_id() {
    let server = TestServer::new();
    assert_error(
        server.get("/api/sse").await,
        StatusCode::BAD_REQUEST,
        "MISSING_REQUIRED_FIELD",
    )
    .await;
    assert_error(
        server.get("/api/sse?session_id=%20").await,
        StatusCode::BAD_REQUEST,
        "MISSING_REQUIRED_FIELD",
    )
    .await;
}

#[tokio::test]
async fn test_invalid_session_id() {
    let server = TestServer::new();
    assert_error(
        server.get("/api/sse?session_id=a%2Fb").await,
        StatusCode::BAD_REQUEST,
        "INVALID_INPUT",
    )
    .await;

    let long = "x".repeat(129);
    assert_error(
        server.get(&format!("/api/sse?session_id={long}")).await,
        StatusCode::BAD_REQUEST,
        "INVALID_INPUT",
    )
    .await;
}

#[tokio::test]
async fn test_invalid_replay_mode() {
    let server = TestServer::new();
    let response = server.get("/api/sse?session_id=s1&replay=latest").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(body["error"]["message"], "invalid replay mode");
}

#[tokio::test]
async fn test_missing_source_is_unavailable() {
    common::init_test_logging();
    let resources = std::sync::Arc::new(
        event_relay_server::resources::ServerResources::with_parts(
            event_relay_server::config::ServerConfig::default(),
            None,
            None,
        ),
    );
    let router = event_relay_server::routes::build_router(&resources);
    assert_error(
        common::get(router.clone(), "/api/sse?session_id=s1").await,
        StatusCode::SERVICE_UNAVAILABLE,
        "RESOURCE_UNAVAILABLE",
    )
    .await;
    assert_error(
        common::get(router, "/api/share/sessions/s1").await,
        StatusCode::SERVICE_UNAVAILABLE,
        "RESOURCE_UNAVAILABLE",
    )
    .await;
}

// ============================================================================
// Share view
// ============================================================================

#[tokio::test]
async fn test_share_view_filters_history() {
    let server = TestServer::new();
    server
        .publish(workflow_event("s1", "r1", 1, types::NODE_STARTED, json!({})))
        .await;
    server
        .publish(workflow_event(
            "s1",
            "r1",
            2,
            types::TOOL_STARTED,
            json!({"tool_name": "subagent"}),
        ))
        .await;
    server
        .publish(workflow_event(
            "s1",
            "r1",
            3,
            types::DIAGNOSTIC_TOOL_FILTERING,
            json!({}),
        ))
        .await;
    let child_tool = workflow_event("s1", "child", 1, types::TOOL_COMPLETED, json!({"tool": "search"}));
    server
        .publish(AgentEvent::Subtask(SubtaskEvent::new(
            child_tool,
            SubtaskMetadata::default(),
        )))
        .await;
    server
        .publish(workflow_event(
            "s1",
            "r1",
            4,
            types::RESULT_FINAL,
            json!({"final_answer": "All done", "is_streaming": true}),
        ))
        .await;

    let response = server.get("/api/share/sessions/s1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["session_id"], "s1");

    let events = body["events"].as_array().unwrap();
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(names, vec![types::NODE_STARTED, types::RESULT_FINAL]);
    assert_eq!(events[1]["data"]["payload"]["final_answer"], "All done");
}

#[tokio::test]
async fn test_share_view_unknown_session_is_empty() {
    let server = TestServer::new();
    let body = json_body(server.get("/api/share/sessions/nobody").await).await;
    assert_eq!(body["events"], json!([]));
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_ends_open_stream() {
    let server = TestServer::new();
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    assert_eq!(reader.next_frame(FRAME_WAIT).await.unwrap().event, "connected");

    server.resources.shutdown.cancel();
    assert!(reader.next_frame(FRAME_WAIT).await.is_none());
    assert!(reader.ended());
}

#[tokio::test]
async fn test_shutdown_ends_guarded_stream() {
    let mut config = ServerConfig::default();
    config.limits.max_concurrent = 4;
    config.limits.max_duration_secs = 600;
    let server = TestServer::with_config(config);
    let mut reader = SseReader::new(server.get("/api/sse?session_id=s1").await);
    reader.next_frame(FRAME_WAIT).await.unwrap();

    server.resources.shutdown.cancel();
    assert!(reader.next_frame(FRAME_WAIT).await.is_none());
    assert!(reader.ended());
}

#[tokio::test]
async fn test_graceful_shutdown_with_connected_client() {
    let server = TestServer::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = server.router.clone();
    let shutdown = server.resources.shutdown.clone();
    let serving = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /api/sse?session_id=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut buf = vec![0_u8; 4096];
    let read = tokio::time::timeout(FRAME_WAIT, client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert!(String::from_utf8_lossy(&buf[..read]).starts_with("HTTP/1.1 200 OK"));

    server.resources.shutdown.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(3), serving).await;
    assert!(
        stopped.is_ok(),
        "server should stop while a client is still connected"
    );
    stopped.unwrap().unwrap().unwrap();
    drop(client);
}
