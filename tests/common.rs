// ABOUTME: Shared test utilities for the event relay integration tests
// ABOUTME: Logging setup, resource wiring, event builders and SSE body readers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    dead_code
)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use event_relay_server::{
    config::ServerConfig,
    events::{AgentEvent, EventMeta, WorkflowEvent},
    publisher::{EventBroadcaster, EventSource},
    resources::ServerResources,
    routes::build_router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tower::ServiceExt;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Test server: router plus a handle on the broadcaster feeding it
pub struct TestServer {
    pub resources: Arc<ServerResources>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub router: Router,
}

impl TestServer {
    /// Server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Server with explicit configuration and an in-process broadcaster
    pub fn with_config(config: ServerConfig) -> Self {
        init_test_logging();
        let broadcaster = Arc::new(EventBroadcaster::new(
            config.sse.history_limit,
            config.sse.client_buffer_size,
        ));
        let source: Arc<dyn EventSource> = broadcaster.clone();
        let resources = Arc::new(ServerResources::with_parts(config, Some(source), None));
        let router = build_router(&resources);
        Self {
            resources,
            broadcaster,
            router,
        }
    }

    /// Publish through the source trait
    pub async fn publish(&self, event: AgentEvent) {
        self.broadcaster.publish(event).await;
    }

    /// Send a GET request against a clone of the router
    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router.clone(), uri).await
    }
}

/// Send a GET request through the router
pub async fn get(router: Router, uri: &str) -> Response<Body> {
    router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Read a complete non-streaming body as JSON
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and the `error.code` of an error response
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], code, "unexpected error body: {body}");
}

/// One parsed SSE frame
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub event: String,
    pub data: Value,
}

/// Incremental reader over a streaming SSE body
pub struct SseReader {
    body: Body,
    buffer: String,
    ended: bool,
}

impl SseReader {
    pub fn new(response: Response<Body>) -> Self {
        Self {
            body: response.into_body(),
            buffer: String::new(),
            ended: false,
        }
    }

    /// Whether the body has reported end of stream
    pub const fn ended(&self) -> bool {
        self.ended
    }

    /// Next data-bearing frame, skipping comments; `None` on timeout or end
    pub async fn next_frame(&mut self, wait: Duration) -> Option<SseFrame> {
        loop {
            if let Some(frame) = self.take_buffered() {
                return Some(frame);
            }
            if self.ended {
                return None;
            }
            match tokio::time::timeout(wait, self.body.frame()).await {
                Err(_) => return None,
                Ok(None) => self.ended = true,
                Ok(Some(frame)) => {
                    let frame = frame.unwrap();
                    if let Some(data) = frame.data_ref() {
                        self.buffer.push_str(&String::from_utf8_lossy(data));
                    }
                }
            }
        }
    }

    /// Collect frames until `wait` passes without a new one
    pub async fn drain(&mut self, wait: Duration) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame(wait).await {
            frames.push(frame);
        }
        frames
    }

    fn take_buffered(&mut self) -> Option<SseFrame> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let block: String = self.buffer.drain(..end + 2).collect();
            let mut event = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    value.trim().clone_into(&mut event);
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.trim_start());
                }
            }
            if !data.is_empty() {
                return Some(SseFrame {
                    event,
                    data: serde_json::from_str(&data).unwrap(),
                });
            }
        }
    }
}

/// Workflow event with explicit ids and sequence
pub fn workflow_event(
    session_id: &str,
    run_id: &str,
    seq: u64,
    event_type: &str,
    payload: Value,
) -> AgentEvent {
    let meta = EventMeta::new(session_id, run_id)
        .with_seq(seq)
        .with_event_id(format!("{run_id}-{seq}"));
    AgentEvent::Workflow(WorkflowEvent::new(meta, event_type).with_payload(payload))
}

/// Workflow event for a graph node
pub fn node_event(
    session_id: &str,
    run_id: &str,
    seq: u64,
    event_type: &str,
    node_id: &str,
    node_kind: &str,
    payload: Value,
) -> AgentEvent {
    let meta = EventMeta::new(session_id, run_id)
        .with_seq(seq)
        .with_event_id(format!("{run_id}-{seq}"));
    AgentEvent::Workflow(
        WorkflowEvent::new(meta, event_type)
            .with_node(node_id, node_kind)
            .with_payload(payload),
    )
}

/// Default wait for a frame that should arrive
pub const FRAME_WAIT: Duration = Duration::from_secs(2);

/// Wait used to assert nothing else arrives
pub const QUIET_WAIT: Duration = Duration::from_millis(200);
