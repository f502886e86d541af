// ABOUTME: Main library entry point for the event relay server
// ABOUTME: Replay/live SSE streaming of agent events with payload sanitization and stream guards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Event Relay Server
//!
//! Streams agent execution events to browser clients over Server-Sent Events.
//! A new connection replays the session's history and then follows the live
//! feed, with overlap removed by per-connection deduplication.
//!
//! ## Architecture
//!
//! - **Cache**: content-addressed byte cache behind `GET /api/data/{id}`
//! - **Sanitizer**: externalizes attachments and `data:` URIs, strips bulky fields
//! - **SSE**: filter, dedup and render pipeline plus the streaming handler
//! - **Middleware**: stream guard enforcing concurrency, byte and duration caps
//! - **Publisher**: event source contract and in-process broadcaster
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use event_relay_server::config::ServerConfig;
//! use event_relay_server::resources::ServerResources;
//! use event_relay_server::routes::build_router;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::new(config)?);
//!     let _router = build_router(&resources);
//!     Ok(())
//! }
//! ```

/// Attachment model, coercion and persistent store
pub mod attachments;

/// Content cache for externalized payloads
pub mod cache;

/// Environment-driven configuration
pub mod config;

/// Agent event model
pub mod events;

/// Structured logging setup
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Event publication source
pub mod publisher;

/// Shared server resources
pub mod resources;

/// HTTP route assembly
pub mod routes;

/// Payload sanitization
pub mod sanitizer;

/// Server-Sent Events stream protocol
pub mod sse;

pub use relay_core::constants;
pub use relay_core::errors;
