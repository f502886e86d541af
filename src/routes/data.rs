// ABOUTME: Read-only endpoints serving externalized payload bytes
// ABOUTME: Content cache lookups by digest and local attachment store files by name
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::attachments::LocalAttachmentStore;
use crate::resources::ServerResources;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use relay_core::constants::routes;
use relay_core::errors::{AppError, AppResult};
use std::sync::Arc;
use tracing::debug;

/// Content cache routes
pub struct DataRoutes;

impl DataRoutes {
    /// `GET /api/data/{id}`
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(routes::DATA, get(Self::handle_get))
            .with_state(resources)
    }

    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        Path(id): Path<String>,
    ) -> Result<Response, AppError> {
        let payload = resources
            .cache
            .get(&id)
            .ok_or_else(|| AppError::not_found("cached payload").with_resource_id(&id))?;
        debug!(digest = %id, size = payload.bytes.len(), "Serving cached payload");
        Ok(bytes_response(&payload.content_type, payload.bytes.to_vec()))
    }
}

/// Local attachment store routes
pub struct AttachmentRoutes;

impl AttachmentRoutes {
    /// `GET /api/attachments/{file}`
    pub fn routes(store: Arc<LocalAttachmentStore>) -> Router {
        Router::new()
            .route(routes::ATTACHMENTS, get(Self::handle_get))
            .with_state(store)
    }

    async fn handle_get(
        State(store): State<Arc<LocalAttachmentStore>>,
        Path(file): Path<String>,
    ) -> AppResult<Response> {
        let (content_type, bytes) = store.load(&file).await?;
        Ok(bytes_response(&content_type, bytes))
    }
}

fn bytes_response(content_type: &str, bytes: Vec<u8>) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}
