// ABOUTME: Centralized resource container shared by every route handler
// ABOUTME: Holds configuration, the content cache, the event source and the sanitizer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server Resources Module
//!
//! Shared resources are built once at startup and handed to handlers as
//! `Arc<ServerResources>` state.

use crate::attachments::{AttachmentStore, LocalAttachmentStore};
use crate::cache::ContentCache;
use crate::config::ServerConfig;
use crate::publisher::{EventBroadcaster, EventSource};
use crate::sanitizer::PayloadSanitizer;
use relay_core::errors::AppResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Effective configuration
    pub config: Arc<ServerConfig>,
    /// Content cache serving externalized payloads
    pub cache: Arc<ContentCache>,
    /// Publication source; streaming endpoints answer 503 without one
    pub source: Option<Arc<dyn EventSource>>,
    /// Local attachment store, when configured
    pub attachment_store: Option<Arc<LocalAttachmentStore>>,
    /// Payload sanitizer shared by every connection
    pub sanitizer: Arc<PayloadSanitizer>,
    /// Cancelled once on process shutdown; every open stream watches a child
    pub shutdown: CancellationToken,
}

impl ServerResources {
    /// Build resources from configuration
    ///
    /// An in-process [`EventBroadcaster`] sized from the SSE settings is used as
    /// the publication source. A local attachment store is opened when
    /// `attachment_dir` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment directory cannot be created
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let source: Arc<dyn EventSource> = Arc::new(EventBroadcaster::new(
            config.sse.history_limit,
            config.sse.client_buffer_size,
        ));
        let store = config
            .attachment_dir
            .as_ref()
            .map(LocalAttachmentStore::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self::with_parts(config, Some(source), store))
    }

    /// Assemble resources from explicit parts
    #[must_use]
    pub fn with_parts(
        config: ServerConfig,
        source: Option<Arc<dyn EventSource>>,
        attachment_store: Option<Arc<LocalAttachmentStore>>,
    ) -> Self {
        let cache = Arc::new(ContentCache::new(&config.data_cache.cache_config()));
        let mut sanitizer =
            PayloadSanitizer::new(Arc::clone(&cache), config.data_cache.sanitizer_config());
        if let Some(store) = &attachment_store {
            let store: Arc<dyn AttachmentStore> = store.clone();
            sanitizer = sanitizer.with_store(store);
        }
        Self {
            config: Arc::new(config),
            cache,
            source,
            attachment_store,
            sanitizer: Arc::new(sanitizer),
            shutdown: CancellationToken::new(),
        }
    }

    /// Publication source, if configured
    #[must_use]
    pub fn source(&self) -> Option<&Arc<dyn EventSource>> {
        self.source.as_ref()
    }
}
