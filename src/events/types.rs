// ABOUTME: Workflow event type names shared by the publisher, filters and renderer
// ABOUTME: String constants matching the wire `event:` field
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Tool call started
pub const TOOL_STARTED: &str = "workflow.tool.started";
/// Tool call progress update
pub const TOOL_PROGRESS: &str = "workflow.tool.progress";
/// Tool call completed
pub const TOOL_COMPLETED: &str = "workflow.tool.completed";

/// Workflow node started
pub const NODE_STARTED: &str = "workflow.node.started";
/// Workflow node completed
pub const NODE_COMPLETED: &str = "workflow.node.completed";
/// Workflow node failed
pub const NODE_FAILED: &str = "workflow.node.failed";
/// Incremental node output
pub const NODE_OUTPUT_DELTA: &str = "workflow.node.output.delta";
/// Node output summary
pub const NODE_OUTPUT_SUMMARY: &str = "workflow.node.output.summary";

/// Terminal answer for a run
pub const RESULT_FINAL: &str = "workflow.result.final";
/// Run cancelled
pub const RESULT_CANCELLED: &str = "workflow.result.cancelled";

/// Internal workflow phase transition record
pub const LIFECYCLE_UPDATED: &str = "workflow.lifecycle.updated";
/// Internal context snapshot
pub const DIAGNOSTIC_CONTEXT_SNAPSHOT: &str = "workflow.diagnostic.context_snapshot";
/// Context compression diagnostic
pub const DIAGNOSTIC_CONTEXT_COMPRESSION: &str = "workflow.diagnostic.context_compression";
/// Tool filtering diagnostic
pub const DIAGNOSTIC_TOOL_FILTERING: &str = "workflow.diagnostic.tool_filtering";
/// Proactive context refresh
pub const PROACTIVE_CONTEXT_REFRESH: &str = "workflow.proactive.context_refresh";

/// User task submission
pub const INPUT_RECEIVED: &str = "workflow.input.received";

/// Node kind of plan steps
pub const NODE_KIND_STEP: &str = "step";
/// Node kind of tool calls
pub const NODE_KIND_TOOL: &str = "tool";
