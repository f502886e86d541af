// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for caches, streams, sanitization and the HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! large file. Every tunable here has a matching environment variable in the
//! server configuration layer.

/// Content cache constants (capacity, TTL)
pub mod cache;
/// Stream protocol constants (dedup sizes, heartbeat, guard limits)
pub mod stream;

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
    /// Default bind address
    pub const DEFAULT_HOST: &str = "0.0.0.0";
}

/// API routes
pub mod routes {
    /// Streaming endpoint
    pub const SSE: &str = "/api/sse";
    /// Read-only session share view
    pub const SHARE_SESSION: &str = "/api/share/sessions/:session_id";
    /// Content cache endpoint prefix
    pub const DATA_PREFIX: &str = "/api/data";
    /// Content cache lookup route
    pub const DATA: &str = "/api/data/:id";
    /// Attachment store endpoint prefix
    pub const ATTACHMENTS_PREFIX: &str = "/api/attachments";
    /// Attachment store lookup route
    pub const ATTACHMENTS: &str = "/api/attachments/:file";
    /// Liveness route
    pub const HEALTH: &str = "/health";
    /// Readiness route
    pub const READY: &str = "/ready";
}

/// Attachment sanitization defaults
pub mod sanitizer {
    /// Largest decoded payload kept inline next to its URL for text-like media
    pub const INLINE_ATTACHMENT_RETENTION_BYTES: usize = 4 * 1024;
    /// Per-connection "already sent" attachment digests
    pub const SENT_ATTACHMENT_CACHE_SIZE: usize = 256;
    /// Preview profile assigned to HTML attachments
    pub const HTML_PREVIEW_PROFILE: &str = "document.html";
    /// Media type used when an attachment does not declare one
    pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";
}

/// Service identity for structured logging
pub mod service_names {
    /// Default service name
    pub const EVENT_RELAY_SERVER: &str = "event-relay-server";
}
