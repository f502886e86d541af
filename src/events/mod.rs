// ABOUTME: Agent execution event model consumed read-only by the streaming layer
// ABOUTME: Workflow envelopes, user input records and the subtask decorator with shared metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Event type name constants
pub mod types;

use crate::attachments::AttachmentMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Which agent tier produced an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentLevel {
    /// Top-level agent
    #[default]
    Core,
    /// Delegated sub-agent
    Subagent,
}

impl fmt::Display for AgentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Subagent => write!(f, "subagent"),
        }
    }
}

/// Identity and ordering metadata shared by all events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique event id
    pub event_id: String,
    /// Owning session
    pub session_id: String,
    /// Run that produced the event
    pub run_id: String,
    /// Parent run for delegated work
    pub parent_run_id: String,
    /// Correlation id across runs
    pub correlation_id: String,
    /// Event that caused this one
    pub causation_id: String,
    /// Per-run sequence number assigned by the publisher (0 = unsequenced)
    pub seq: u64,
    /// Publication time
    pub timestamp: DateTime<Utc>,
    /// Producing agent tier
    pub agent_level: AgentLevel,
}

impl EventMeta {
    /// Metadata for a new event in `session_id` / `run_id` with a fresh id
    pub fn new(session_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            run_id: run_id.into(),
            parent_run_id: String::new(),
            correlation_id: String::new(),
            causation_id: String::new(),
            seq: 0,
            timestamp: Utc::now(),
            agent_level: AgentLevel::Core,
        }
    }

    /// Set the per-run sequence number
    #[must_use]
    pub const fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Set the event id
    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    /// Set the parent run id
    #[must_use]
    pub fn with_parent_run(mut self, parent_run_id: impl Into<String>) -> Self {
        self.parent_run_id = parent_run_id.into();
        self
    }

    /// Set the agent tier
    #[must_use]
    pub const fn with_agent_level(mut self, agent_level: AgentLevel) -> Self {
        self.agent_level = agent_level;
        self
    }
}

/// Workflow envelope: node lifecycle, tool calls, results and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Shared metadata
    pub meta: EventMeta,
    /// Event type name
    pub event_type: String,
    /// Node identifier (`react:iter:1:tool`, `subagent:0`, ...)
    #[serde(default)]
    pub node_id: String,
    /// Node kind (`tool`, `step`, `diagnostic`, `orchestrator`)
    #[serde(default)]
    pub node_kind: String,
    /// Arbitrary structured payload
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl WorkflowEvent {
    /// Create an envelope with an empty payload
    pub fn new(meta: EventMeta, event_type: impl Into<String>) -> Self {
        Self {
            meta,
            event_type: event_type.into(),
            node_id: String::new(),
            node_kind: String::new(),
            payload: Map::new(),
        }
    }

    /// Set node identity
    #[must_use]
    pub fn with_node(mut self, node_id: impl Into<String>, node_kind: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self.node_kind = node_kind.into();
        self
    }

    /// Replace the payload; non-object values are ignored
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        if let Value::Object(map) = payload {
            self.payload = map;
        }
        self
    }
}

/// User task submission with its uploaded attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputReceivedEvent {
    /// Shared metadata
    pub meta: EventMeta,
    /// Task text
    pub task: String,
    /// Uploaded attachments
    #[serde(default)]
    pub attachments: AttachmentMap,
}

/// Position of a delegated sub-run within its fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskMetadata {
    /// 1-based index of this subtask
    pub index: usize,
    /// Number of subtasks in the fan-out
    pub total: usize,
    /// Short preview of the subtask goal
    pub preview: String,
    /// Parallelism limit of the fan-out
    pub max_parallel: usize,
}

/// Decorator marking an event as produced by a delegated sub-run
#[derive(Debug, Clone, PartialEq)]
pub struct SubtaskEvent {
    inner: Arc<AgentEvent>,
    /// Fan-out position
    pub metadata: SubtaskMetadata,
}

impl SubtaskEvent {
    /// Wrap `inner` with subtask metadata
    pub fn new(inner: impl Into<Arc<AgentEvent>>, metadata: SubtaskMetadata) -> Self {
        Self {
            inner: inner.into(),
            metadata,
        }
    }

    /// The event this decorator wraps
    #[must_use]
    pub fn wrapped(&self) -> &AgentEvent {
        &self.inner
    }
}

/// Any event the publication source can deliver
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Workflow envelope
    Workflow(WorkflowEvent),
    /// User input
    InputReceived(InputReceivedEvent),
    /// Delegated sub-run event
    Subtask(SubtaskEvent),
}

impl AgentEvent {
    /// Innermost event with all subtask decorators removed
    #[must_use]
    pub fn base(&self) -> &Self {
        let mut current = self;
        while let Self::Subtask(subtask) = current {
            current = subtask.wrapped();
        }
        current
    }

    /// Metadata of the underlying event
    #[must_use]
    pub fn meta(&self) -> &EventMeta {
        match self.base() {
            Self::Workflow(event) => &event.meta,
            Self::InputReceived(event) => &event.meta,
            // base() never returns a decorator
            Self::Subtask(subtask) => subtask.wrapped().meta(),
        }
    }

    /// Wire event type name
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self.base() {
            Self::Workflow(event) => &event.event_type,
            Self::InputReceived(_) => types::INPUT_RECEIVED,
            Self::Subtask(subtask) => subtask.wrapped().event_type(),
        }
    }

    /// Underlying workflow envelope, if any
    #[must_use]
    pub fn as_workflow(&self) -> Option<&WorkflowEvent> {
        match self.base() {
            Self::Workflow(event) => Some(event),
            _ => None,
        }
    }

    /// Outermost subtask metadata, if the event is decorated
    #[must_use]
    pub fn subtask_metadata(&self) -> Option<&SubtaskMetadata> {
        match self {
            Self::Subtask(subtask) => Some(&subtask.metadata),
            _ => None,
        }
    }

    /// Whether the event came from a delegated sub-run
    #[must_use]
    pub fn is_subtask(&self) -> bool {
        matches!(self, Self::Subtask(_))
    }
}

impl From<WorkflowEvent> for AgentEvent {
    fn from(event: WorkflowEvent) -> Self {
        Self::Workflow(event)
    }
}

impl From<InputReceivedEvent> for AgentEvent {
    fn from(event: InputReceivedEvent) -> Self {
        Self::InputReceived(event)
    }
}

impl From<SubtaskEvent> for AgentEvent {
    fn from(event: SubtaskEvent) -> Self {
        Self::Subtask(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subtask_delegates_to_inner() {
        let inner = WorkflowEvent::new(
            EventMeta::new("s1", "run-child").with_seq(3),
            types::TOOL_STARTED,
        )
        .with_node("subagent:0", types::NODE_KIND_TOOL)
        .with_payload(json!({ "tool_name": "subagent" }));
        let wrapped: AgentEvent = SubtaskEvent::new(
            AgentEvent::from(inner.clone()),
            SubtaskMetadata {
                index: 1,
                total: 2,
                preview: "look things up".to_owned(),
                max_parallel: 2,
            },
        )
        .into();

        assert!(wrapped.is_subtask());
        assert_eq!(wrapped.event_type(), types::TOOL_STARTED);
        assert_eq!(wrapped.meta().run_id, "run-child");
        assert_eq!(wrapped.meta().seq, 3);
        assert_eq!(wrapped.as_workflow(), Some(&inner));
        assert_eq!(wrapped.subtask_metadata().map(|m| m.total), Some(2));
    }

    #[test]
    fn test_input_event_type() {
        let event: AgentEvent = InputReceivedEvent {
            meta: EventMeta::new("s1", "r1"),
            task: "hello".to_owned(),
            attachments: AttachmentMap::new(),
        }
        .into();
        assert_eq!(event.event_type(), types::INPUT_RECEIVED);
        assert!(event.as_workflow().is_none());
    }

    #[test]
    fn test_agent_level_serializes_lowercase() {
        assert_eq!(serde_json::to_value(AgentLevel::Subagent).unwrap(), json!("subagent"));
        assert_eq!(AgentLevel::Core.to_string(), "core");
    }
}
