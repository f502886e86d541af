// ABOUTME: Visibility rules deciding which agent events reach a stream or share view
// ABOUTME: Hides internal lifecycle records, gates diagnostics behind debug and trims delegation chatter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::events::{types, AgentEvent, WorkflowEvent};

/// Node id prefix of internal reasoning iterations
const INTERNAL_ITERATION_PREFIX: &str = "react:iter:";

/// Node id prefix of delegated sub-agent calls
const DELEGATION_NODE_PREFIX: &str = "subagent:";

/// Tool name of delegated sub-agent calls
const DELEGATION_TOOL_NAME: &str = "subagent";

/// Event types that only drive internal bookkeeping
const NEVER_STREAMED: [&str; 2] = [types::LIFECYCLE_UPDATED, types::DIAGNOSTIC_CONTEXT_SNAPSHOT];

/// Event types shown only to `debug=1` connections
const DEBUG_ONLY: [&str; 3] = [
    types::DIAGNOSTIC_CONTEXT_COMPRESSION,
    types::DIAGNOSTIC_TOOL_FILTERING,
    types::PROACTIVE_CONTEXT_REFRESH,
];

/// Audience of a filtered event sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamView {
    /// Live SSE connection of the session owner
    Live,
    /// Read-only share page for external viewers
    Share,
}

/// Per-connection event visibility
#[derive(Debug, Clone, Copy)]
pub struct StreamFilter {
    debug: bool,
    view: StreamView,
}

impl StreamFilter {
    /// Filter for a live connection
    #[must_use]
    pub const fn live(debug: bool) -> Self {
        Self {
            debug,
            view: StreamView::Live,
        }
    }

    /// Filter for the share view; diagnostics and delegation chatter are always hidden
    #[must_use]
    pub const fn share() -> Self {
        Self {
            debug: false,
            view: StreamView::Share,
        }
    }

    /// Whether debug-only events are visible
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Audience of this filter
    #[must_use]
    pub const fn view(&self) -> StreamView {
        self.view
    }

    /// Whether `event` may be emitted to this audience
    #[must_use]
    pub fn allows(&self, event: &AgentEvent) -> bool {
        let event_type = event.event_type();
        if NEVER_STREAMED.contains(&event_type) {
            return false;
        }
        if !self.debug && is_debug_only(event) {
            return false;
        }

        match self.view {
            StreamView::Live => {
                !is_delegation_tool_event(event)
                    || matches!(event_type, types::TOOL_STARTED | types::TOOL_COMPLETED)
            }
            StreamView::Share => {
                !is_delegation_tool_event(event) && !(event.is_subtask() && is_tool_event(event))
            }
        }
    }
}

fn is_tool_event(event: &AgentEvent) -> bool {
    matches!(
        event.event_type(),
        types::TOOL_STARTED | types::TOOL_PROGRESS | types::TOOL_COMPLETED
    )
}

/// Diagnostic event types and internal reasoning iteration nodes
#[must_use]
pub fn is_debug_only(event: &AgentEvent) -> bool {
    if DEBUG_ONLY.contains(&event.event_type()) {
        return true;
    }
    event
        .as_workflow()
        .is_some_and(|envelope| envelope.node_id.starts_with(INTERNAL_ITERATION_PREFIX))
}

/// Tool events of a delegated sub-agent call, identified by tool name or node id
#[must_use]
pub fn is_delegation_tool_event(event: &AgentEvent) -> bool {
    if !is_tool_event(event) {
        return false;
    }
    let Some(envelope) = event.as_workflow() else {
        return false;
    };
    match tool_name(envelope) {
        Some(name) => name == DELEGATION_TOOL_NAME,
        None => envelope
            .node_id
            .to_ascii_lowercase()
            .starts_with(DELEGATION_NODE_PREFIX),
    }
}

fn tool_name(envelope: &WorkflowEvent) -> Option<String> {
    ["tool_name", "tool"].into_iter().find_map(|key| {
        envelope
            .payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
    })
}
