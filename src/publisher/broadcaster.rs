// ABOUTME: In-memory event broadcaster keeping bounded per-session history
// ABOUTME: Fans published events out to live subscribers through tokio broadcast channels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::EventSource;
use crate::events::AgentEvent;
use async_trait::async_trait;
use relay_core::constants::stream::{CLIENT_BUFFER_SIZE, EVENT_HISTORY_LIMIT};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

struct SessionChannel {
    sender: broadcast::Sender<Arc<AgentEvent>>,
    history: VecDeque<Arc<AgentEvent>>,
    active_run_id: Option<String>,
}

impl SessionChannel {
    fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self {
            sender,
            history: VecDeque::new(),
            active_run_id: None,
        }
    }

    /// Nothing to replay, no run in flight and nobody listening
    fn is_idle(&self) -> bool {
        self.history.is_empty()
            && self.active_run_id.is_none()
            && self.sender.receiver_count() == 0
    }
}

/// Drop idle sessions so subscribers to unknown ids cannot grow the map
fn prune_idle(sessions: &mut HashMap<String, SessionChannel>) {
    let before = sessions.len();
    sessions.retain(|_, channel| !channel.is_idle());
    let pruned = before - sessions.len();
    if pruned > 0 {
        debug!(pruned, remaining = sessions.len(), "Pruned idle event sessions");
    }
}

/// Session-scoped event fan-out with replayable history
#[derive(Clone)]
pub struct EventBroadcaster {
    sessions: Arc<RwLock<HashMap<String, SessionChannel>>>,
    history_limit: usize,
    buffer_size: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster with explicit history and subscriber buffer sizes
    #[must_use]
    pub fn new(history_limit: usize, buffer_size: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history_limit,
            buffer_size,
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(EVENT_HISTORY_LIMIT, CLIENT_BUFFER_SIZE)
    }
}

#[async_trait]
impl EventSource for EventBroadcaster {
    async fn publish(&self, event: AgentEvent) -> usize {
        let session_id = event.meta().session_id.clone();
        let event = Arc::new(event);
        let mut sessions = self.sessions.write().await;
        let channel = sessions
            .entry(session_id.clone())
            .or_insert_with(|| SessionChannel::new(self.buffer_size));

        if self.history_limit > 0 {
            channel.history.push_back(Arc::clone(&event));
            while channel.history.len() > self.history_limit {
                channel.history.pop_front();
            }
        }

        // No receivers is not an error: history still serves later replays
        let delivered = channel.sender.send(event).unwrap_or(0);
        drop(sessions);
        debug!(session_id = %session_id, receivers = delivered, "Published event");
        delivered
    }

    async fn history(&self, session_id: &str) -> Vec<Arc<AgentEvent>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|channel| channel.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<Arc<AgentEvent>> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(session_id) {
            prune_idle(&mut sessions);
        }
        let receiver = sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionChannel::new(self.buffer_size))
            .sender
            .subscribe();
        drop(sessions);
        debug!(session_id = %session_id, "Registered live subscriber");
        receiver
    }

    async fn active_run_id(&self, session_id: &str) -> String {
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|channel| channel.active_run_id.clone())
            .unwrap_or_default()
    }

    async fn set_active_run(&self, session_id: &str, run_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionChannel::new(self.buffer_size))
            .active_run_id = Some(run_id.to_owned());
        drop(sessions);
        debug!(session_id = %session_id, run_id = %run_id, "Active run set");
    }

    async fn clear_active_run(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(channel) = sessions.get_mut(session_id) {
            channel.active_run_id = None;
            if channel.is_idle() {
                sessions.remove(session_id);
            }
        }
    }
}
