// ABOUTME: HTTP middleware protecting long-lived streaming responses
// ABOUTME: Concurrency, byte and duration caps driven by a per-request cancellation token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Stream guard layer, service and cancellation extension
pub mod stream_guard;

pub use stream_guard::{
    is_stream_request, StreamCancellation, StreamGuardConfig, StreamGuardLayer, StreamGuardService,
};
