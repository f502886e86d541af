// ABOUTME: Stream protocol constants for dedup windows, heartbeat and guard limits
// ABOUTME: Per-connection state sizes and broadcast buffer defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Runs tracked per connection for `(run_id, seq)` dedup
pub const RUN_SEQ_CACHE_SIZE: usize = 2_048;

/// Event ids tracked per connection for id-based dedup
pub const SEEN_EVENT_ID_CACHE_SIZE: usize = 10_000;

/// Runs tracked per connection for final-answer delta streaming
pub const FINAL_ANSWER_CACHE_SIZE: usize = 64;

/// Heartbeat comment interval in seconds
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Broadcast buffer per session subscription
pub const CLIENT_BUFFER_SIZE: usize = 100;

/// Events retained per session for replay
pub const EVENT_HISTORY_LIMIT: usize = 1_000;

/// Longest accepted session identifier
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Guard: maximum concurrent streams (0 disables the cap)
pub const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 0;

/// Guard: maximum bytes per stream (0 disables the cap)
pub const DEFAULT_MAX_STREAM_BYTES: u64 = 0;

/// Guard: maximum stream duration in seconds (0 disables the cap)
pub const DEFAULT_MAX_STREAM_DURATION_SECS: u64 = 0;
