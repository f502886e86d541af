// ABOUTME: Payload sanitizer turning raw event payloads into bounded wire-safe JSON
// ABOUTME: Externalizes inline attachment bytes and suppresses attachments already sent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Payload Sanitizer
//!
//! Pure transformation layer between the event source and the wire. It consults
//! the shared [`ContentCache`] and an optional [`AttachmentStore`] for
//! externalized bytes, and a per-connection [`SentAttachmentTracker`] to avoid
//! re-sending unchanged attachments on the same connection.

/// Attachment normalization and per-connection suppression
pub mod attachments;
/// Recursive envelope payload walk and step result scrubbing
pub mod envelope;
/// Per-connection record of attachment digests already sent
pub mod tracker;

pub use attachments::attachment_digest;
pub use envelope::{scrub_step_payload, summarize_step_result};
pub use tracker::SentAttachmentTracker;

use crate::attachments::AttachmentStore;
use crate::cache::ContentCache;
use relay_core::constants::sanitizer::INLINE_ATTACHMENT_RETENTION_BYTES;
use std::sync::Arc;

/// Sanitizer tunables
#[derive(Debug, Clone, Copy)]
pub struct SanitizerConfig {
    /// Largest decoded text-like payload kept inline next to its URL
    pub inline_retention_bytes: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            inline_retention_bytes: INLINE_ATTACHMENT_RETENTION_BYTES,
        }
    }
}

/// Shared sanitizer; per-connection state is passed in explicitly
#[derive(Clone)]
pub struct PayloadSanitizer {
    cache: Arc<ContentCache>,
    store: Option<Arc<dyn AttachmentStore>>,
    config: SanitizerConfig,
}

impl PayloadSanitizer {
    /// Create a sanitizer backed by the content cache only
    #[must_use]
    pub fn new(cache: Arc<ContentCache>, config: SanitizerConfig) -> Self {
        Self {
            cache,
            store: None,
            config,
        }
    }

    /// Persist inline payloads to `store` before falling back to the cache
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn AttachmentStore>) -> Self {
        self.store = Some(store);
        self
    }
}
