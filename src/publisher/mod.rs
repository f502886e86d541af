// ABOUTME: Event publication source contract consumed by the streaming endpoints
// ABOUTME: Publish, bounded per-session history, live subscription and active run lookup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// In-process broadcaster with bounded history
pub mod broadcaster;

pub use broadcaster::EventBroadcaster;

use crate::events::AgentEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Source of agent events for one process.
///
/// Streaming connections subscribe before reading history so nothing published
/// in between is lost; the handler removes the overlap by deduplication.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Publish an event to its session; returns the number of live receivers
    async fn publish(&self, event: AgentEvent) -> usize;

    /// Bounded history for a session, oldest first
    async fn history(&self, session_id: &str) -> Vec<Arc<AgentEvent>>;

    /// Live feed for a session
    async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<Arc<AgentEvent>>;

    /// Run currently executing in the session, empty when idle
    async fn active_run_id(&self, session_id: &str) -> String;

    /// Mark `run_id` as the run currently executing in `session_id`
    async fn set_active_run(&self, session_id: &str, run_id: &str);

    /// Clear the active run of `session_id`
    async fn clear_active_run(&self, session_id: &str);
}
