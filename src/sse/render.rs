// ABOUTME: Wire frame model and envelope field rendering for streamed agent events
// ABOUTME: Flattens subtask metadata and turns streaming final answers into text deltas
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::events::{AgentEvent, EventMeta, SubtaskMetadata};
use axum::response::sse::Event;
use chrono::SecondsFormat;
use lru::LruCache;
use relay_core::constants::stream::FINAL_ANSWER_CACHE_SIZE;
use relay_core::errors::{AppError, AppResult};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::num::NonZeroUsize;

/// Name of the first frame on every stream
pub const CONNECTED_EVENT: &str = "connected";

/// One outgoing frame: `event: <event>` plus a JSON `data:` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamFrame {
    /// Event type name
    pub event: String,
    /// JSON body
    pub data: Map<String, Value>,
}

impl StreamFrame {
    /// Opening frame carrying the session's active run, empty when idle
    #[must_use]
    pub fn connected(session_id: &str, active_run_id: &str) -> Self {
        let data = json!({
            "session_id": session_id,
            "active_run_id": active_run_id,
        });
        Self {
            event: CONNECTED_EVENT.to_owned(),
            data: match data {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// Encode as an SSE event
    ///
    /// # Errors
    ///
    /// Returns an error if the event name cannot be carried on a single line
    /// or the body fails to serialize.
    pub fn to_sse_event(&self) -> AppResult<Event> {
        if self.event.contains(['\n', '\r']) {
            return Err(AppError::serialization(format!(
                "event type {:?} contains a line break",
                self.event
            )));
        }
        let body = serde_json::to_string(&self.data)?;
        Ok(Event::default().event(&self.event).data(body))
    }
}

/// Envelope fields every frame carries
pub(crate) fn base_fields(meta: &EventMeta, event_type: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("event_type".to_owned(), Value::from(event_type));
    data.insert(
        "timestamp".to_owned(),
        Value::from(meta.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)),
    );
    data.insert(
        "agent_level".to_owned(),
        Value::from(meta.agent_level.to_string()),
    );
    data.insert("session_id".to_owned(), Value::from(meta.session_id.as_str()));
    data.insert("run_id".to_owned(), Value::from(meta.run_id.as_str()));
    data.insert(
        "parent_run_id".to_owned(),
        Value::from(meta.parent_run_id.as_str()),
    );
    data.insert("is_subtask".to_owned(), Value::Bool(false));
    data
}

/// Mark a frame as produced by a delegated sub-run
pub(crate) fn apply_subtask_fields(data: &mut Map<String, Value>, metadata: &SubtaskMetadata) {
    data.insert("is_subtask".to_owned(), Value::Bool(true));
    if metadata.index > 0 {
        data.insert("subtask_index".to_owned(), Value::from(metadata.index));
    }
    if metadata.total > 0 {
        data.insert("total_subtasks".to_owned(), Value::from(metadata.total));
    }
    if !metadata.preview.is_empty() {
        data.insert(
            "subtask_preview".to_owned(),
            Value::from(metadata.preview.as_str()),
        );
    }
    if metadata.max_parallel > 0 {
        data.insert("max_parallel".to_owned(), Value::from(metadata.max_parallel));
    }
}

/// Subtask metadata of every decorator layer, outermost last so it wins
pub(crate) fn subtask_layers(event: &AgentEvent) -> Vec<&SubtaskMetadata> {
    let mut layers = Vec::new();
    let mut current = event;
    while let AgentEvent::Subtask(subtask) = current {
        layers.push(&subtask.metadata);
        current = subtask.wrapped();
    }
    layers.reverse();
    layers
}

/// Previously streamed final-answer text per run on one connection
pub struct FinalAnswerTracker {
    streamed: LruCache<String, String>,
}

impl FinalAnswerTracker {
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(FINAL_ANSWER_CACHE_SIZE) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Tracker remembering up to `capacity` runs
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            streamed: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(Self::DEFAULT_CAPACITY)),
        }
    }

    /// Replace `final_answer` with the part not yet streamed for `run_id`.
    ///
    /// Text is remembered while `is_streaming` is set and forgotten once
    /// `stream_finished` arrives.
    pub fn apply(&mut self, run_id: &str, payload: &mut Map<String, Value>) {
        let Some(full) = payload
            .get("final_answer")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            return;
        };

        let delta = match self.streamed.get(run_id) {
            Some(previous) => full
                .strip_prefix(previous.as_str())
                .map_or_else(|| full.clone(), str::to_owned),
            None => full.clone(),
        };

        if !run_id.is_empty() {
            if flag(payload, "is_streaming") {
                self.streamed.put(run_id.to_owned(), full);
            }
            if flag(payload, "stream_finished") {
                self.streamed.pop(run_id);
            }
        }
        payload.insert("final_answer".to_owned(), Value::String(delta));
    }
}

impl Default for FinalAnswerTracker {
    fn default() -> Self {
        Self::new(FINAL_ANSWER_CACHE_SIZE)
    }
}

fn flag(payload: &Map<String, Value>, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}
