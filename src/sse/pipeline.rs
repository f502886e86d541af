// ABOUTME: Per-connection event pipeline: filter, dedup, sanitize and render into frames
// ABOUTME: Owns every piece of connection-local state so replay and live share one path
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::dedup::EventDeduper;
use super::filter::{StreamFilter, StreamView};
use super::render::{apply_subtask_fields, base_fields, subtask_layers, FinalAnswerTracker, StreamFrame};
use crate::config::SseConfig;
use crate::events::{types, AgentEvent};
use crate::sanitizer::{PayloadSanitizer, SentAttachmentTracker};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

/// Event-to-frame pipeline for one connection or one share request
pub struct EventPipeline {
    sanitizer: Arc<PayloadSanitizer>,
    filter: StreamFilter,
    deduper: EventDeduper,
    sent: SentAttachmentTracker,
    /// Present only for live streams; the share view renders full answers
    final_answers: Option<FinalAnswerTracker>,
}

impl EventPipeline {
    /// Pipeline with connection state sized from `config`
    #[must_use]
    pub fn new(sanitizer: Arc<PayloadSanitizer>, filter: StreamFilter, config: &SseConfig) -> Self {
        let final_answers = match filter.view() {
            StreamView::Live => Some(FinalAnswerTracker::new(config.final_answer_cache_size)),
            StreamView::Share => None,
        };
        Self {
            sanitizer,
            filter,
            deduper: EventDeduper::new(config.run_seq_cache_size, config.seen_event_id_cache_size),
            sent: SentAttachmentTracker::new(config.sent_attachment_cache_size),
            final_answers,
        }
    }

    /// Frame for `event`, or `None` when it is filtered out or a duplicate
    pub fn process(&mut self, event: &AgentEvent) -> Option<StreamFrame> {
        if !self.filter.allows(event) {
            trace!(event_type = %event.event_type(), "Event filtered");
            return None;
        }
        if !self.deduper.admit(event.meta()) {
            trace!(
                event_type = %event.event_type(),
                run_id = %event.meta().run_id,
                seq = event.meta().seq,
                "Duplicate event dropped"
            );
            return None;
        }
        Some(StreamFrame {
            event: event.event_type().to_owned(),
            data: self.render(event),
        })
    }

    fn render(&mut self, event: &AgentEvent) -> Map<String, Value> {
        let meta = event.meta();
        let mut data = base_fields(meta, event.event_type());

        match event.base() {
            AgentEvent::InputReceived(input) => {
                if let Some(attachments) = self.sanitizer.sanitize_attachments_for_stream(
                    &input.attachments,
                    &mut self.sent,
                    false,
                ) {
                    if let Ok(value) = serde_json::to_value(attachments) {
                        data.insert("attachments".to_owned(), value);
                    }
                }
                data.insert("task".to_owned(), Value::from(input.task.as_str()));
            }
            AgentEvent::Workflow(envelope) => {
                if !envelope.node_id.is_empty() {
                    data.insert("node_id".to_owned(), Value::from(envelope.node_id.as_str()));
                }
                if !envelope.node_kind.is_empty() {
                    data.insert(
                        "node_kind".to_owned(),
                        Value::from(envelope.node_kind.as_str()),
                    );
                }
                let payload = self
                    .sanitizer
                    .sanitize_workflow_envelope_payload(envelope, &mut self.sent);
                if let Some(mut payload) = payload {
                    if envelope.event_type == types::RESULT_FINAL {
                        if let Some(tracker) = self.final_answers.as_mut() {
                            tracker.apply(&meta.run_id, &mut payload);
                        }
                    }
                    data.insert("payload".to_owned(), Value::Object(payload));
                }
            }
            AgentEvent::Subtask(_) => {}
        }

        for layer in subtask_layers(event) {
            apply_subtask_fields(&mut data, layer);
        }
        data
    }
}
