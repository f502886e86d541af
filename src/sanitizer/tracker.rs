// ABOUTME: Bounded per-connection map of attachment name to last sent content digest
// ABOUTME: Lets a stream skip attachments whose content did not change since the last frame
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use lru::LruCache;
use relay_core::constants::sanitizer::SENT_ATTACHMENT_CACHE_SIZE;
use std::num::NonZeroUsize;

/// Attachment digests already delivered on one connection.
///
/// Owned by a single connection and never shared, so it needs no locking.
pub struct SentAttachmentTracker {
    sent: LruCache<String, String>,
}

impl SentAttachmentTracker {
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(SENT_ATTACHMENT_CACHE_SIZE) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Tracker remembering up to `capacity` attachment names
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sent: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(Self::DEFAULT_CAPACITY)),
        }
    }

    /// Digest last sent under `name`
    pub fn last_digest(&mut self, name: &str) -> Option<&str> {
        self.sent.get(name).map(String::as_str)
    }

    /// Whether `digest` is what was last sent under `name`
    pub fn already_sent(&mut self, name: &str, digest: &str) -> bool {
        self.last_digest(name) == Some(digest)
    }

    /// Record `digest` as sent under `name`
    pub fn record(&mut self, name: &str, digest: String) {
        self.sent.put(name.to_owned(), digest);
    }

    /// Names currently tracked
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Nothing sent yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl Default for SentAttachmentTracker {
    fn default() -> Self {
        Self::new(SENT_ATTACHMENT_CACHE_SIZE)
    }
}
