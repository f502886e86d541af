// ABOUTME: Server-Sent Events stream protocol for agent event sessions
// ABOUTME: Replay then live forwarding with filtering, dedup and sanitized frame rendering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Protocol
//!
//! Each connection runs `Connecting -> Replaying -> Live -> Closing -> Closed`.
//! Replayed and live events pass through the same [`EventPipeline`]: visibility
//! filter, `(run_id, seq)` and event-id dedup, payload sanitization and frame
//! rendering.

/// Connection phases and close logging
pub mod connection;
/// Per-connection duplicate suppression
pub mod dedup;
/// Event visibility rules
pub mod filter;
/// Filter, dedup and render pipeline
pub mod pipeline;
/// Frame model and field rendering
pub mod render;
/// HTTP handlers
pub mod routes;

pub use connection::{CloseReason, ConnectionPhase, StreamConnection};
pub use dedup::EventDeduper;
pub use filter::{StreamFilter, StreamView};
pub use pipeline::EventPipeline;
pub use render::{FinalAnswerTracker, StreamFrame, CONNECTED_EVENT};
pub use routes::{parse_debug_flag, validate_session_id, ReplayMode, StreamRoutes};
