// ABOUTME: Tower middleware bounding concurrent streams, bytes written and stream lifetime
// ABOUTME: Trips a per-request cancellation token that streaming handlers observe
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Stream guard middleware
//!
//! Applies only to streaming requests: paths under `/api/sse`, paths containing
//! `/stream`, or requests accepting `text/event-stream`. Each admitted request
//! gets a [`StreamCancellation`] extension. The token is cancelled when the
//! byte cap is crossed, when the duration timer fires, or when the response
//! body is dropped. The concurrency slot is held by the response body.

use axum::{
    body::Body,
    http::{header, Request, Response},
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body::{Body as HttpBody, Frame, SizeHint};
use relay_core::constants::routes::SSE;
use relay_core::errors::AppError;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::{Layer, Service};
use tracing::{debug, info, warn};

/// Stream guard limits; zero or `None` disables a limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamGuardConfig {
    /// Concurrent streams admitted
    pub max_concurrent: usize,
    /// Response bytes per stream
    pub max_bytes: u64,
    /// Stream lifetime
    pub max_duration: Option<Duration>,
}

impl StreamGuardConfig {
    /// No limit configured; the guard passes requests through untouched
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.max_concurrent == 0 && self.max_bytes == 0 && self.max_duration.is_none()
    }
}

/// Cancellation signal of a guarded streaming request
#[derive(Debug, Clone, Default)]
pub struct StreamCancellation(CancellationToken);

impl StreamCancellation {
    /// Wrap an existing token
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    /// Token to select on
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.0.clone()
    }

    /// Whether the guard tripped
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Whether `req` opens a long-lived stream
#[must_use]
pub fn is_stream_request<B>(req: &Request<B>) -> bool {
    let path = req.uri().path();
    if path.starts_with(SSE) || path.contains("/stream") {
        return true;
    }
    req.headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.to_ascii_lowercase().contains("text/event-stream"))
}

/// Stream guard layer for Tower middleware
#[derive(Clone)]
pub struct StreamGuardLayer {
    config: StreamGuardConfig,
    slots: Option<Arc<Semaphore>>,
}

impl StreamGuardLayer {
    /// Create a guard enforcing `config`
    #[must_use]
    pub fn new(config: StreamGuardConfig) -> Self {
        let slots = (config.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent)));
        Self { config, slots }
    }

    /// Streams currently holding a concurrency slot
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.slots.as_ref().map_or(0, |slots| {
            self.config
                .max_concurrent
                .saturating_sub(slots.available_permits())
        })
    }
}

impl<S> Layer<S> for StreamGuardLayer {
    type Service = StreamGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StreamGuardService {
            inner,
            config: self.config,
            slots: self.slots.clone(),
        }
    }
}

/// Stream guard service
#[derive(Clone)]
pub struct StreamGuardService<S> {
    inner: S,
    config: StreamGuardConfig,
    slots: Option<Arc<Semaphore>>,
}

impl<S> Service<Request<Body>> for StreamGuardService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.is_disabled() || !is_stream_request(&req) {
            return Box::pin(inner.call(req));
        }

        let config = self.config;
        let permit = match self.slots.clone().map(Semaphore::try_acquire_owned) {
            None => None,
            Some(Ok(permit)) => Some(permit),
            Some(Err(_)) => {
                warn!(
                    path = %req.uri().path(),
                    max_concurrent = config.max_concurrent,
                    "Stream limit exceeded"
                );
                let response = AppError::rate_limited("stream limit exceeded", config.max_concurrent)
                    .into_response();
                return Box::pin(async move { Ok(response) });
            }
        };

        let token = CancellationToken::new();
        req.extensions_mut()
            .insert(StreamCancellation::new(token.clone()));
        if let Some(limit) = config.max_duration {
            spawn_duration_timer(token.clone(), limit);
        }

        Box::pin(async move {
            let response = inner.call(req).await?;
            let (parts, body) = response.into_parts();
            let guarded = GuardedBody {
                inner: body,
                token: token.clone(),
                _cancel_on_drop: token.drop_guard(),
                _permit: permit,
                written: 0,
                max_bytes: config.max_bytes,
                exhausted: false,
            };
            Ok(Response::from_parts(parts, Body::new(guarded)))
        })
    }
}

fn spawn_duration_timer(token: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(limit) => {
                info!(limit_secs = limit.as_secs_f64(), "Stream duration limit reached");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    });
}

/// Response body that counts bytes, ends after the byte cap and releases its
/// concurrency slot and timer when dropped
struct GuardedBody {
    inner: Body,
    token: CancellationToken,
    _cancel_on_drop: DropGuard,
    _permit: Option<OwnedSemaphorePermit>,
    written: u64,
    max_bytes: u64,
    exhausted: bool,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }

        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.written = this
                        .written
                        .saturating_add(u64::try_from(data.len()).unwrap_or(u64::MAX));
                    if this.max_bytes > 0 && this.written >= this.max_bytes {
                        info!(
                            written = this.written,
                            max_bytes = this.max_bytes,
                            "Stream byte limit reached"
                        );
                        this.token.cancel();
                        this.exhausted = true;
                    }
                }
            }
            Poll::Ready(None) => {
                debug!(written = this.written, "Guarded stream finished");
                this.exhausted = true;
            }
            Poll::Ready(Some(Err(_))) | Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.exhausted || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        if self.max_bytes == 0 {
            self.inner.size_hint()
        } else {
            SizeHint::default()
        }
    }
}
