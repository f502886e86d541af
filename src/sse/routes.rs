// ABOUTME: SSE streaming endpoint and read-only session share view
// ABOUTME: Validates requests, replays history, forwards the live feed and honours cancellation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! SSE routes
//!
//! `GET /api/sse?session_id=..&replay=..&debug=..` streams a session's events.
//! The handler subscribes to the live feed before reading history so nothing
//! published in between is lost; overlap is removed by per-connection dedup.
//! Streams end when the guard cancels them or the server shuts down.

use super::connection::{CloseReason, ConnectionPhase, StreamConnection};
use super::filter::StreamFilter;
use super::pipeline::EventPipeline;
use super::render::StreamFrame;
use crate::events::AgentEvent;
use crate::middleware::StreamCancellation;
use crate::publisher::EventSource;
use crate::resources::ServerResources;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Extension, Json, Router,
};
use relay_core::constants::routes;
use relay_core::constants::stream::MAX_SESSION_ID_LEN;
use relay_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Query parameters of the streaming endpoint
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Session to stream
    pub session_id: Option<String>,
    /// `full` (default), `session` or `none`
    pub replay: Option<String>,
    /// `1` or `true` to include debug-only events
    pub debug: Option<String>,
}

/// History replay behaviour of a new connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Replay everything available for the session
    Full,
    /// Replay the session's own history
    Session,
    /// Live events only
    None,
}

impl ReplayMode {
    /// Whether session history is replayed
    #[must_use]
    pub const fn includes_history(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for ReplayMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Ok(Self::Full),
            "session" => Ok(Self::Session),
            "none" => Ok(Self::None),
            _ => Err(AppError::invalid_input("invalid replay mode")),
        }
    }
}

/// Validate a session id taken from a query string or path
///
/// # Errors
///
/// Returns a missing-field error when absent or blank and an invalid-input
/// error when too long or containing anything but ASCII letters, digits,
/// `-` and `_`
pub fn validate_session_id(raw: Option<&str>) -> AppResult<String> {
    let session_id = raw.map(str::trim).unwrap_or_default();
    if session_id.is_empty() {
        return Err(AppError::missing_field("session_id"));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(AppError::invalid_input(format!(
            "session_id exceeds {MAX_SESSION_ID_LEN} characters"
        )));
    }
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(AppError::invalid_input(
            "session_id contains invalid characters",
        ));
    }
    Ok(session_id.to_owned())
}

/// `debug=1` or `debug=true`, case-insensitive
#[must_use]
pub fn parse_debug_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

/// One event of the share view
pub type SharedEvent = StreamFrame;

/// Share view body
#[derive(Debug, Serialize)]
pub struct ShareSessionResponse {
    /// Shared session
    pub session_id: String,
    /// Filtered, sanitized history
    pub events: Vec<SharedEvent>,
}

/// SSE routes implementation
pub struct StreamRoutes;

impl StreamRoutes {
    /// Create the streaming and share routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::SSE, get(Self::handle_stream))
            .route(routes::SHARE_SESSION, get(Self::handle_share))
            .with_state(resources)
    }

    fn require_source(resources: &ServerResources) -> AppResult<Arc<dyn EventSource>> {
        resources
            .source()
            .cloned()
            .ok_or_else(|| AppError::unavailable("event source is not configured"))
    }

    async fn handle_stream(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<StreamQuery>,
        cancellation: Option<Extension<StreamCancellation>>,
    ) -> Result<Response, AppError> {
        let session_id = validate_session_id(query.session_id.as_deref())?;
        let replay: ReplayMode = query.replay.as_deref().unwrap_or_default().parse()?;
        let debug = parse_debug_flag(query.debug.as_deref());
        let source = Self::require_source(&resources)?;
        let shutdown = resources.shutdown.child_token();
        let guard = cancellation.map(|Extension(cancellation)| cancellation.token());

        let mut connection = StreamConnection::open(session_id.clone());
        let mut receiver = source.subscribe(&session_id).await;
        let active_run_id = source.active_run_id(&session_id).await;
        let history = if replay.includes_history() {
            source.history(&session_id).await
        } else {
            Vec::new()
        };
        let mut pipeline = EventPipeline::new(
            Arc::clone(&resources.sanitizer),
            StreamFilter::live(debug),
            &resources.config.sse,
        );

        let stream = async_stream::stream! {
            if let Some(event) = encode(&StreamFrame::connected(&session_id, &active_run_id)) {
                connection.record_frame();
                yield Ok::<_, Infallible>(event);
            }

            connection.transition(ConnectionPhase::Replaying);
            info!(session_id = %session_id, events = history.len(), replay = ?replay, "Replaying session history");
            for event in &history {
                if let Some(reason) = stop_reason(&shutdown, guard.as_ref()) {
                    connection.close(reason);
                    return;
                }
                if let Some(frame) = render(&mut pipeline, event) {
                    connection.record_frame();
                    yield Ok(frame);
                }
            }
            drop(history);

            connection.transition(ConnectionPhase::Live);
            loop {
                let received = tokio::select! {
                    () = shutdown.cancelled() => None,
                    () = guard_cancelled(guard.as_ref()) => None,
                    received = receiver.recv() => Some(received),
                };
                match received {
                    None => {
                        let reason = stop_reason(&shutdown, guard.as_ref());
                        connection.close(reason.unwrap_or(CloseReason::Cancelled));
                        break;
                    }
                    Some(Ok(event)) => {
                        if let Some(frame) = render(&mut pipeline, &event) {
                            connection.record_frame();
                            yield Ok(frame);
                        }
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        warn!(session_id = %session_id, skipped, "SSE subscriber lagged, events dropped");
                    }
                    Some(Err(RecvError::Closed)) => {
                        connection.close(CloseReason::SourceClosed);
                        break;
                    }
                }
            }
        };

        let keep_alive = KeepAlive::new()
            .interval(resources.config.sse.heartbeat_interval())
            .text("heartbeat");
        let headers = [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ];
        Ok((headers, Sse::new(stream).keep_alive(keep_alive)).into_response())
    }

    async fn handle_share(
        State(resources): State<Arc<ServerResources>>,
        Path(session_id): Path<String>,
    ) -> Result<Json<ShareSessionResponse>, AppError> {
        let session_id = validate_session_id(Some(&session_id))?;
        let source = Self::require_source(&resources)?;
        let history = source.history(&session_id).await;

        let mut pipeline = EventPipeline::new(
            Arc::clone(&resources.sanitizer),
            StreamFilter::share(),
            &resources.config.sse,
        );
        let events: Vec<SharedEvent> = history
            .iter()
            .filter_map(|event| pipeline.process(event))
            .collect();
        info!(session_id = %session_id, events = events.len(), "Served session share view");

        Ok(Json(ShareSessionResponse { session_id, events }))
    }
}

/// Why the stream must stop, if either token has fired
fn stop_reason(
    shutdown: &CancellationToken,
    guard: Option<&CancellationToken>,
) -> Option<CloseReason> {
    if shutdown.is_cancelled() {
        Some(CloseReason::Shutdown)
    } else if guard.is_some_and(CancellationToken::is_cancelled) {
        Some(CloseReason::Cancelled)
    } else {
        None
    }
}

async fn guard_cancelled(guard: Option<&CancellationToken>) {
    match guard {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn encode(frame: &StreamFrame) -> Option<Event> {
    match frame.to_sse_event() {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event_type = %frame.event, error = %e, "Dropping frame that failed to encode");
            None
        }
    }
}

fn render(pipeline: &mut EventPipeline, event: &AgentEvent) -> Option<Event> {
    pipeline.process(event).and_then(|frame| encode(&frame))
}
