// ABOUTME: Content-addressed cache backing externalized attachment and data-URI payloads
// ABOUTME: Shared by every streaming connection, bounded by entry count and lazy TTL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Content cache with LRU eviction and lazy TTL expiry
pub mod content;
/// `data:` URI parsing helpers
pub mod data_uri;

pub use content::{CachedPayload, ContentCache, ContentCacheStats, DataUriDescriptor};

use relay_core::constants::cache::{
    DATA_URI_CAPACITY_MULTIPLIER, DEFAULT_DATA_CACHE_MAX_ENTRIES, DEFAULT_DATA_CACHE_TTL_SECS,
    MIN_DATA_URI_CACHE_ENTRIES,
};
use relay_core::constants::routes::DATA_PREFIX;
use std::time::Duration;

/// Content cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of byte payloads kept (0 falls back to the default)
    pub max_entries: usize,
    /// Age after which an entry is treated as absent on lookup
    pub ttl: Duration,
    /// Path prefix under which stored payloads are served
    pub url_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_DATA_CACHE_MAX_ENTRIES,
            ttl: Duration::from_secs(DEFAULT_DATA_CACHE_TTL_SECS),
            url_prefix: DATA_PREFIX.to_owned(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with explicit capacity and TTL
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            ..Self::default()
        }
    }

    /// Effective byte-payload capacity
    #[must_use]
    pub fn byte_capacity(&self) -> usize {
        if self.max_entries == 0 {
            DEFAULT_DATA_CACHE_MAX_ENTRIES
        } else {
            self.max_entries
        }
    }

    /// Effective data-URI descriptor capacity: twice the byte capacity, never below the floor
    #[must_use]
    pub fn data_uri_capacity(&self) -> usize {
        (self.byte_capacity() * DATA_URI_CAPACITY_MULTIPLIER).max(MIN_DATA_URI_CACHE_ENTRIES)
    }
}
