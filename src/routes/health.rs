// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Liveness always answers; readiness reports the event source and cache occupancy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Health check routes for service monitoring
//!
//! `/health` is a liveness probe. `/ready` answers 503 until an event source is
//! attached, since streaming requests would fail without one.

use crate::resources::ServerResources;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use relay_core::constants::routes;
use serde_json::{json, Value};
use std::sync::Arc;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::HEALTH, get(Self::health_handler))
            .route(routes::READY, get(Self::ready_handler))
            .with_state(resources)
    }

    async fn health_handler(State(resources): State<Arc<ServerResources>>) -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": resources.config.service_name,
            "version": resources.config.service_version,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    async fn ready_handler(
        State(resources): State<Arc<ServerResources>>,
    ) -> (StatusCode, Json<Value>) {
        let stats = resources.cache.stats();
        let source_ready = resources.source().is_some();
        let status = if source_ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            status,
            Json(json!({
                "status": if source_ready { "ready" } else { "not_ready" },
                "checks": {
                    "event_source": source_ready,
                    "attachment_store": resources.attachment_store.is_some(),
                },
                "cache": {
                    "byte_entries": stats.byte_entries,
                    "data_uri_entries": stats.data_uri_entries,
                    "stored_bytes": stats.stored_bytes,
                },
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        )
    }
}
