// ABOUTME: Route module organization for the event relay HTTP surface
// ABOUTME: Merges streaming, content, attachment and health routes behind the stream guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module exposes a `routes()` constructor returning a stateless
//! `Router`; [`build_router`] merges them and applies the middleware stack.

/// Content cache and attachment store routes
pub mod data;
/// Health check and readiness routes
pub mod health;

pub use data::{AttachmentRoutes, DataRoutes};
pub use health::HealthRoutes;

use crate::middleware::StreamGuardLayer;
use crate::resources::ServerResources;
use crate::sse::StreamRoutes;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble the full application router
///
/// The stream guard wraps every route; non-streaming requests pass through it
/// untouched.
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    let mut router = Router::new()
        .merge(StreamRoutes::routes(Arc::clone(resources)))
        .merge(DataRoutes::routes(Arc::clone(resources)))
        .merge(HealthRoutes::routes(Arc::clone(resources)));

    if let Some(store) = &resources.attachment_store {
        router = router.merge(AttachmentRoutes::routes(Arc::clone(store)));
    }

    router
        .layer(StreamGuardLayer::new(resources.config.limits.guard_config()))
        .layer(TraceLayer::new_for_http())
}
