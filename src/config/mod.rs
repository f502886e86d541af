// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Loads typed configuration sections from the process environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration module for the event relay server
//!
//! - **Environment**: server, stream limit, cache and SSE settings from
//!   environment variables

/// Environment and server configuration
pub mod environment;

pub use environment::{
    DataCacheConfig, HttpConfig, ServerConfig, SseConfig, StreamLimitsConfig,
};
