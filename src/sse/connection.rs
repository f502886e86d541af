// ABOUTME: Streaming connection lifecycle phases with structured transition logging
// ABOUTME: Records why a connection closed even when the client simply goes away
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Lifecycle of one streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Request validated, subscription being set up
    Connecting,
    /// Emitting bounded history
    Replaying,
    /// Forwarding the live feed
    Live,
    /// Releasing subscription and connection state
    Closing,
    /// No further writes
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Replaying => write!(f, "replaying"),
            Self::Live => write!(f, "live"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The response body was dropped by the HTTP layer
    ClientClosed,
    /// The stream guard cancelled the connection
    Cancelled,
    /// The server is shutting down
    Shutdown,
    /// The publication source closed the session feed
    SourceClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client_closed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::SourceClosed => write!(f, "source_closed"),
        }
    }
}

/// Phase and counters of one live stream.
///
/// Dropping a connection that was never closed explicitly logs it as closed
/// by the client.
#[derive(Debug)]
pub struct StreamConnection {
    session_id: String,
    phase: ConnectionPhase,
    frames_sent: u64,
    opened_at: Instant,
}

impl StreamConnection {
    /// Connection in the `Connecting` phase
    #[must_use]
    pub fn open(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        info!(session_id = %session_id, phase = %ConnectionPhase::Connecting, "SSE connection established");
        Self {
            session_id,
            phase: ConnectionPhase::Connecting,
            frames_sent: 0,
            opened_at: Instant::now(),
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Frames written so far
    #[must_use]
    pub const fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Count one emitted frame
    pub fn record_frame(&mut self) {
        self.frames_sent += 1;
    }

    /// Move to `next` unless already closed
    pub fn transition(&mut self, next: ConnectionPhase) {
        if self.phase == ConnectionPhase::Closed || self.phase == next {
            return;
        }
        debug!(
            session_id = %self.session_id,
            from = %self.phase,
            to = %next,
            "SSE connection phase change"
        );
        self.phase = next;
    }

    /// Close the connection, logging `reason`; later calls are ignored
    pub fn close(&mut self, reason: CloseReason) {
        if self.phase == ConnectionPhase::Closed {
            return;
        }
        self.transition(ConnectionPhase::Closing);
        info!(
            session_id = %self.session_id,
            close_reason = %reason,
            frames_sent = self.frames_sent,
            duration_ms = self.opened_at.elapsed().as_millis(),
            "SSE connection closed"
        );
        self.transition(ConnectionPhase::Closed);
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close(CloseReason::ClientClosed);
    }
}
