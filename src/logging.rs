// ABOUTME: Logging configuration and structured logging setup for the relay server
// ABOUTME: Chooses the output format from the environment and quiets chatty dependency crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Structured logging configuration

use anyhow::Result;
use relay_core::constants::service_names;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Directives applied on top of `RUST_LOG`
const NOISE_REDUCTION: [&str; 3] = ["hyper=warn", "hyper::proto=warn", "tower_http=info"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Full human-readable lines
    Pretty,
    /// Single-line output without targets
    Compact,
}

impl LogFormat {
    /// `LOG_FORMAT` wins; otherwise production gets JSON and everything else pretty
    #[must_use]
    pub fn select(log_format: Option<&str>, environment: Option<&str>) -> Self {
        match log_format.map(str::trim) {
            Some("json") => Self::Json,
            Some("compact") => Self::Compact,
            Some("pretty") => Self::Pretty,
            _ if environment == Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub filter: String,
    /// Output format
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
}

impl LoggingConfig {
    /// Read `RUST_LOG`, `LOG_FORMAT`, `ENVIRONMENT` and `LOG_INCLUDE_LOCATION`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            format: LogFormat::select(
                env::var("LOG_FORMAT").ok().as_deref(),
                env::var("ENVIRONMENT").ok().as_deref(),
            ),
            include_location: env::var("LOG_INCLUDE_LOCATION").is_ok(),
        }
    }

    /// Filter from the configured directives with noise reduction applied
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        let base = EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("info"));
        NOISE_REDUCTION
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(base, EnvFilter::add_directive)
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.env_filter());
        let layer = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_writer(io::stdout);

        match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init()?,
            LogFormat::Pretty => registry.with(layer).try_init()?,
            LogFormat::Compact => registry.with(layer.compact().with_target(false)).try_init()?,
        }

        info!(
            service.name = service_names::EVENT_RELAY_SERVER,
            service.version = env!("CARGO_PKG_VERSION"),
            log.filter = %self.filter,
            log.format = ?self.format,
            "Logging initialized"
        );
        Ok(())
    }
}

/// Initialize logging from environment
///
/// # Errors
///
/// Returns an error if logging initialization fails
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}
