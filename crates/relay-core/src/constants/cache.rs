// ABOUTME: Content cache constants for capacity and time-to-live
// ABOUTME: Defaults shared by the cache component and its environment configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Default maximum byte-payload entries in the content cache
pub const DEFAULT_DATA_CACHE_MAX_ENTRIES: usize = 512;

/// Default entry time-to-live in seconds, checked lazily on lookup
pub const DEFAULT_DATA_CACHE_TTL_SECS: u64 = 1_800; // 30 minutes

/// Data-URI descriptors are cached at this multiple of the byte capacity
pub const DATA_URI_CAPACITY_MULTIPLIER: usize = 2;

/// Lower bound for the data-URI descriptor cache capacity
pub const MIN_DATA_URI_CACHE_ENTRIES: usize = 64;
