// ABOUTME: Per-connection duplicate suppression by run sequence number and event id
// ABOUTME: Removes overlap between replayed history and the live feed on one stream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::events::EventMeta;
use lru::LruCache;
use relay_core::constants::stream::{RUN_SEQ_CACHE_SIZE, SEEN_EVENT_ID_CACHE_SIZE};
use std::num::NonZeroUsize;

const DEFAULT_RUN_CAPACITY: NonZeroUsize = match NonZeroUsize::new(RUN_SEQ_CACHE_SIZE) {
    Some(n) => n,
    None => unreachable!(),
};

const DEFAULT_ID_CAPACITY: NonZeroUsize = match NonZeroUsize::new(SEEN_EVENT_ID_CACHE_SIZE) {
    Some(n) => n,
    None => unreachable!(),
};

/// Highest emitted sequence per run plus recently emitted event ids.
///
/// An event is a duplicate when its sequence is at or below the highest
/// sequence already emitted for its run, or when its id was emitted before.
/// Unsequenced events (`seq == 0`) and events without a run id skip the
/// sequence check.
pub struct EventDeduper {
    last_seq_by_run: LruCache<String, u64>,
    seen_event_ids: LruCache<String, ()>,
}

impl EventDeduper {
    /// Deduper tracking up to `run_capacity` runs and `id_capacity` event ids
    #[must_use]
    pub fn new(run_capacity: usize, id_capacity: usize) -> Self {
        Self {
            last_seq_by_run: LruCache::new(
                NonZeroUsize::new(run_capacity).unwrap_or(DEFAULT_RUN_CAPACITY),
            ),
            seen_event_ids: LruCache::new(
                NonZeroUsize::new(id_capacity).unwrap_or(DEFAULT_ID_CAPACITY),
            ),
        }
    }

    /// Record `meta` and report whether it has not been emitted before
    pub fn admit(&mut self, meta: &EventMeta) -> bool {
        let run_id = meta.run_id.trim();
        if meta.seq > 0 && !run_id.is_empty() {
            if let Some(&last) = self.last_seq_by_run.get(run_id) {
                if meta.seq <= last {
                    return false;
                }
            }
            self.last_seq_by_run.put(run_id.to_owned(), meta.seq);
        }

        let event_id = meta.event_id.trim();
        if !event_id.is_empty() {
            if self.seen_event_ids.contains(event_id) {
                return false;
            }
            self.seen_event_ids.put(event_id.to_owned(), ());
        }
        true
    }
}

impl Default for EventDeduper {
    fn default() -> Self {
        Self::new(RUN_SEQ_CACHE_SIZE, SEEN_EVENT_ID_CACHE_SIZE)
    }
}
