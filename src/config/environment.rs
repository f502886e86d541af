// ABOUTME: Environment configuration for the event relay server
// ABOUTME: Typed sections for HTTP binding, stream limits, content cache and SSE connection state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration
//!
//! Every setting has a default in `relay_core::constants`. Values that fail to
//! parse fall back to that default and are reported at `warn`.

use crate::cache::CacheConfig;
use crate::middleware::StreamGuardConfig;
use crate::sanitizer::SanitizerConfig;
use anyhow::{bail, Result};
use relay_core::constants::{cache, ports, sanitizer, service_names, stream};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: ports::DEFAULT_HOST.to_owned(),
            port: ports::DEFAULT_HTTP_PORT,
        }
    }
}

/// Stream guard limits; zero disables a limit
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamLimitsConfig {
    /// Concurrent streaming requests admitted
    pub max_concurrent: usize,
    /// Response bytes per stream
    pub max_bytes: u64,
    /// Stream lifetime in seconds
    pub max_duration_secs: u64,
}

impl StreamLimitsConfig {
    /// Guard configuration for the middleware
    #[must_use]
    pub const fn guard_config(&self) -> StreamGuardConfig {
        StreamGuardConfig {
            max_concurrent: self.max_concurrent,
            max_bytes: self.max_bytes,
            max_duration: if self.max_duration_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(self.max_duration_secs))
            },
        }
    }
}

/// Content cache sizing
#[derive(Debug, Clone, Copy)]
pub struct DataCacheConfig {
    /// Byte payloads kept
    pub max_entries: usize,
    /// Entry lifetime in seconds (0 keeps entries until evicted)
    pub ttl_secs: u64,
    /// Largest text-like payload retained inline next to its URL
    pub inline_retention_bytes: usize,
}

impl Default for DataCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: cache::DEFAULT_DATA_CACHE_MAX_ENTRIES,
            ttl_secs: cache::DEFAULT_DATA_CACHE_TTL_SECS,
            inline_retention_bytes: sanitizer::INLINE_ATTACHMENT_RETENTION_BYTES,
        }
    }
}

impl DataCacheConfig {
    /// Content cache configuration
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.max_entries, Duration::from_secs(self.ttl_secs))
    }

    /// Sanitizer configuration
    #[must_use]
    pub const fn sanitizer_config(&self) -> SanitizerConfig {
        SanitizerConfig {
            inline_retention_bytes: self.inline_retention_bytes,
        }
    }
}

/// Per-connection SSE state sizes and publication source buffers
#[derive(Debug, Clone, Copy)]
pub struct SseConfig {
    /// Attachment digests remembered per connection
    pub sent_attachment_cache_size: usize,
    /// Runs tracked for `(run_id, seq)` dedup
    pub run_seq_cache_size: usize,
    /// Event ids tracked for id dedup
    pub seen_event_id_cache_size: usize,
    /// Runs tracked for final-answer deltas
    pub final_answer_cache_size: usize,
    /// Heartbeat comment interval in seconds
    pub heartbeat_interval_secs: u64,
    /// Live feed buffer per subscriber
    pub client_buffer_size: usize,
    /// Events kept per session for replay
    pub history_limit: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            sent_attachment_cache_size: sanitizer::SENT_ATTACHMENT_CACHE_SIZE,
            run_seq_cache_size: stream::RUN_SEQ_CACHE_SIZE,
            seen_event_id_cache_size: stream::SEEN_EVENT_ID_CACHE_SIZE,
            final_answer_cache_size: stream::FINAL_ANSWER_CACHE_SIZE,
            heartbeat_interval_secs: stream::HEARTBEAT_INTERVAL_SECS,
            client_buffer_size: stream::CLIENT_BUFFER_SIZE,
            history_limit: stream::EVENT_HISTORY_LIMIT,
        }
    }
}

impl SseConfig {
    /// Heartbeat interval as a duration
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Stream guard limits
    pub limits: StreamLimitsConfig,
    /// Content cache
    pub data_cache: DataCacheConfig,
    /// SSE connection state
    pub sse: SseConfig,
    /// Directory of the persistent attachment store, if any
    pub attachment_dir: Option<PathBuf>,
    /// Service name reported in logs and health output
    pub service_name: String,
    /// Crate version
    pub service_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            limits: StreamLimitsConfig::default(),
            data_cache: DataCacheConfig::default(),
            sse: SseConfig::default(),
            attachment_dir: None,
            service_name: service_names::EVENT_RELAY_SERVER.to_owned(),
            service_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a loaded value fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http: HttpConfig {
                host: env::var("HOST")
                    .ok()
                    .filter(|host| !host.trim().is_empty())
                    .unwrap_or_else(|| ports::DEFAULT_HOST.to_owned()),
                port: env_parse_or("HTTP_PORT", ports::DEFAULT_HTTP_PORT),
            },
            limits: StreamLimitsConfig {
                max_concurrent: env_parse_or(
                    "STREAM_MAX_CONCURRENT",
                    stream::DEFAULT_MAX_CONCURRENT_STREAMS,
                ),
                max_bytes: env_parse_or("STREAM_MAX_BYTES", stream::DEFAULT_MAX_STREAM_BYTES),
                max_duration_secs: env_parse_or(
                    "STREAM_MAX_DURATION_SECS",
                    stream::DEFAULT_MAX_STREAM_DURATION_SECS,
                ),
            },
            data_cache: DataCacheConfig {
                max_entries: env_parse_or(
                    "DATA_CACHE_MAX_ENTRIES",
                    cache::DEFAULT_DATA_CACHE_MAX_ENTRIES,
                ),
                ttl_secs: env_parse_or("DATA_CACHE_TTL_SECS", cache::DEFAULT_DATA_CACHE_TTL_SECS),
                inline_retention_bytes: env_parse_or(
                    "INLINE_ATTACHMENT_RETENTION_BYTES",
                    sanitizer::INLINE_ATTACHMENT_RETENTION_BYTES,
                ),
            },
            sse: SseConfig {
                sent_attachment_cache_size: env_parse_or(
                    "SSE_SENT_ATTACHMENT_CACHE_SIZE",
                    sanitizer::SENT_ATTACHMENT_CACHE_SIZE,
                ),
                run_seq_cache_size: env_parse_or(
                    "SSE_RUN_SEQ_CACHE_SIZE",
                    stream::RUN_SEQ_CACHE_SIZE,
                ),
                seen_event_id_cache_size: env_parse_or(
                    "SSE_SEEN_EVENT_ID_CACHE_SIZE",
                    stream::SEEN_EVENT_ID_CACHE_SIZE,
                ),
                final_answer_cache_size: env_parse_or(
                    "SSE_FINAL_ANSWER_CACHE_SIZE",
                    stream::FINAL_ANSWER_CACHE_SIZE,
                ),
                heartbeat_interval_secs: env_parse_or(
                    "SSE_HEARTBEAT_SECS",
                    stream::HEARTBEAT_INTERVAL_SECS,
                ),
                client_buffer_size: env_parse_or("SSE_CLIENT_BUFFER", stream::CLIENT_BUFFER_SIZE),
                history_limit: env_parse_or("EVENT_HISTORY_LIMIT", stream::EVENT_HISTORY_LIMIT),
            },
            attachment_dir: env::var("ATTACHMENT_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| service_names::EVENT_RELAY_SERVER.to_owned()),
            service_version: env!("CARGO_PKG_VERSION").to_owned(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate values that parse but cannot work
    ///
    /// # Errors
    ///
    /// Returns an error for a zero heartbeat interval or subscriber buffer
    pub fn validate(&self) -> Result<()> {
        if self.sse.heartbeat_interval_secs == 0 {
            bail!("SSE_HEARTBEAT_SECS must be greater than zero");
        }
        if self.sse.client_buffer_size == 0 {
            bail!("SSE_CLIENT_BUFFER must be greater than zero");
        }
        if self.data_cache.ttl_secs == 0 {
            warn!("DATA_CACHE_TTL_SECS is 0, cached payloads never expire");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Event Relay Server Configuration:\n\
             - HTTP: {}:{}\n\
             - Stream Limits: concurrent={}, bytes={}, duration={}\n\
             - Data Cache: {} entries, ttl {}s, inline text up to {} bytes\n\
             - SSE: heartbeat {}s, buffer {}, history {}\n\
             - Attachment Store: {}",
            self.http.host,
            self.http.port,
            limit_label(self.limits.max_concurrent),
            limit_label(self.limits.max_bytes),
            if self.limits.max_duration_secs == 0 {
                "unlimited".to_owned()
            } else {
                format!("{}s", self.limits.max_duration_secs)
            },
            self.data_cache.max_entries,
            self.data_cache.ttl_secs,
            self.data_cache.inline_retention_bytes,
            self.sse.heartbeat_interval_secs,
            self.sse.client_buffer_size,
            self.sse.history_limit,
            self.attachment_dir
                .as_ref()
                .map_or_else(|| "disabled".to_owned(), |dir| dir.display().to_string()),
        )
    }
}

fn limit_label<T: Display + PartialEq + Default>(value: T) -> String {
    if value == T::default() {
        "unlimited".to_owned()
    } else {
        value.to_string()
    }
}

/// Parse `key` from the environment, falling back to `default` when unset or invalid
fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default = %default, "Invalid configuration value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.http.port, ports::DEFAULT_HTTP_PORT);
        assert_eq!(config.data_cache.max_entries, 512);
        assert_eq!(config.sse.seen_event_id_cache_size, 10_000);
        assert!(config.attachment_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_duration_disables_timer() {
        let limits = StreamLimitsConfig::default();
        assert!(limits.guard_config().max_duration.is_none());
        let limits = StreamLimitsConfig {
            max_duration_secs: 5,
            ..limits
        };
        assert_eq!(limits.guard_config().max_duration, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_summary_mentions_limits() {
        let summary = ServerConfig::default().summary();
        assert!(summary.contains("concurrent=unlimited"));
        assert!(summary.contains("Attachment Store: disabled"));
    }
}
