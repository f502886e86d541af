// ABOUTME: Recursive walk over generic event payloads producing the wire-safe form
// ABOUTME: Sanitizes nested attachments, strips message history and replaces data URIs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{PayloadSanitizer, SentAttachmentTracker};
use crate::attachments::{coerce_attachment_map, AttachmentSource};
use crate::events::{types, WorkflowEvent};
use serde_json::{Map, Value};

/// Keys that carry full conversational history or internal graph state
const STRIPPED_KEYS: [&str; 3] = ["messages", "attachment_iterations", "nodes"];

/// Keys removed from step results before they are summarized
const STEP_RESULT_STRIPPED_KEYS: [&str; 2] = ["messages", "attachment_iterations"];

/// Remove message history from a step result; list-shaped results carry nothing useful
fn clean_step_result(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !STEP_RESULT_STRIPPED_KEYS.contains(&key.as_str()))
                .map(|(key, val)| (key.clone(), val.clone()))
                .collect(),
        ),
        Value::Array(_) => Value::Null,
        other => other.clone(),
    }
}

/// One-line summary of a step result.
///
/// Prefers an error message, then the first non-empty of `summary`,
/// `content`, `output` or `text`, then `description`, then a compact JSON
/// rendering of what is left once history and attachments are removed.
#[must_use]
pub fn summarize_step_result(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let non_empty = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            };
            if let Some(error) = non_empty("error") {
                return error;
            }
            if let Some(text) = ["summary", "content", "output", "text"]
                .into_iter()
                .find_map(non_empty)
            {
                return text;
            }

            let remaining: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| {
                    !matches!(
                        key.as_str(),
                        "messages" | "attachments" | "attachment_iterations"
                    )
                })
                .map(|(key, val)| (key.clone(), val.clone()))
                .collect();
            if remaining.is_empty() {
                return String::new();
            }
            if let Some(description) = remaining
                .get("description")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            {
                return description.to_owned();
            }
            Value::Object(remaining).to_string()
        }
        other => other.to_string(),
    }
}

/// Strip message history from a completed step and add a `step_result` summary
#[must_use]
pub fn scrub_step_payload(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut scrubbed = payload.clone();
    if let Some(result) = payload.get("result") {
        let clean = clean_step_result(result);
        let summary = summarize_step_result(&clean);
        scrubbed.insert("result".to_owned(), clean);
        if !summary.is_empty() {
            scrubbed.insert("step_result".to_owned(), Value::String(summary));
        }
    } else if let Some(step_result) = payload.get("step_result") {
        let summary = summarize_step_result(step_result);
        if !summary.is_empty() {
            scrubbed.insert("step_result".to_owned(), Value::String(summary));
        }
    }
    scrubbed
}

/// Walk state for one payload: the connection's sent tracker and force flag
struct EnvelopeWalker<'a> {
    sanitizer: &'a PayloadSanitizer,
    sent: &'a mut SentAttachmentTracker,
    force_attachments: bool,
}

impl EnvelopeWalker<'_> {
    fn payload(&mut self, payload: &Map<String, Value>) -> Option<Map<String, Value>> {
        if payload.is_empty() {
            return None;
        }
        let mut sanitized = Map::with_capacity(payload.len());
        for (key, value) in payload {
            let clean = match key.as_str() {
                "attachments" => self.attachments(value),
                "result" => self.value(&clean_step_result(value)),
                _ => self.value(value),
            };
            sanitized.insert(key.clone(), clean);
        }
        Some(sanitized)
    }

    fn value(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sanitized = Map::with_capacity(map.len());
                for (key, val) in map {
                    if STRIPPED_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    let clean = if key == "attachments" {
                        self.attachments(val)
                    } else {
                        self.value(val)
                    };
                    sanitized.insert(key.clone(), clean);
                }
                Value::Object(sanitized)
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.value(item)).collect()),
            Value::String(s) => self
                .sanitizer
                .cache
                .maybe_store_data_uri(s)
                .and_then(|descriptor| serde_json::to_value(descriptor).ok())
                .unwrap_or_else(|| value.clone()),
            other => other.clone(),
        }
    }

    fn attachments(&mut self, value: &Value) -> Value {
        let Value::Object(raw) = value else {
            return self.value(value);
        };
        match coerce_attachment_map(AttachmentSource::Untyped(value)) {
            Some(attachments) => self
                .sanitizer
                .sanitize_attachments_for_stream(&attachments, self.sent, self.force_attachments)
                .and_then(|map| serde_json::to_value(map).ok())
                .unwrap_or(Value::Null),
            None => self.payload(raw).map_or(Value::Null, Value::Object),
        }
    }
}

impl PayloadSanitizer {
    /// Sanitize a generic payload map.
    ///
    /// Every nested `attachments` field is replaced by the attachments this
    /// connection still needs (null when all were suppressed), message history
    /// is stripped and inline `data:` URIs become cache descriptors. Returns
    /// `None` for an empty payload.
    pub fn sanitize_envelope_payload(
        &self,
        payload: &Map<String, Value>,
        sent: &mut SentAttachmentTracker,
        force_attachments: bool,
    ) -> Option<Map<String, Value>> {
        EnvelopeWalker {
            sanitizer: self,
            sent,
            force_attachments,
        }
        .payload(payload)
    }

    /// Sanitize a workflow envelope's payload.
    ///
    /// Completed steps are scrubbed of message history first, and the terminal
    /// final-answer event always carries its full attachment set.
    pub fn sanitize_workflow_envelope_payload(
        &self,
        event: &WorkflowEvent,
        sent: &mut SentAttachmentTracker,
    ) -> Option<Map<String, Value>> {
        let force_attachments = event.event_type == types::RESULT_FINAL;
        if event.event_type == types::NODE_COMPLETED && event.node_kind == types::NODE_KIND_STEP {
            let scrubbed = scrub_step_payload(&event.payload);
            return self.sanitize_envelope_payload(&scrubbed, sent, force_attachments);
        }
        self.sanitize_envelope_payload(&event.payload, sent, force_attachments)
    }
}
