//! Realtime fan-out of domain events to connected clients.
//!
//! [`EventHub`] is an explicit connection manager: callers `connect()` for a
//! [`ClientHandle`], receive events through it, and `disconnect()` (or just
//! drop it) to deregister. There is no global hub; the server constructs one
//! and hands it around, so tests build their own.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::sync::broadcast;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    DocumentAdded,
    BadgeAwarded,
    SuggestionsCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RemoteEvent {
    pub kind: EventKind,
    /// Scope for client-side filtering; `None` for user-wide events.
    pub project_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl RemoteEvent {
    pub fn new(kind: EventKind, project_id: Option<Uuid>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            project_id,
            payload,
            at: Utc::now(),
        }
    }
}

struct HubInner {
    sender: broadcast::Sender<RemoteEvent>,
    clients: DashMap<u64, DateTime<Utc>>,
    next_client_id: AtomicU64,
}

/// A registered subscriber. Dropping the handle deregisters it.
pub struct ClientHandle {
    id: u64,
    receiver: broadcast::Receiver<RemoteEvent>,
    hub: Arc<HubInner>,
}

impl ClientHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or a lag/closed error from the broadcast channel.
    pub async fn recv(&mut self) -> Result<RemoteEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.hub.clients.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// `capacity` bounds the per-subscriber backlog; a client that falls
    /// further behind observes a `Lagged` error and skips ahead.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                sender,
                clients: DashMap::new(),
                next_client_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a subscriber. The handle only sees events published after
    /// this call.
    pub fn connect(&self) -> ClientHandle {
        let id = self.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.inner.clients.insert(id, Utc::now());
        debug!(client_id = id, "event client connected");
        ClientHandle {
            id,
            receiver: self.inner.sender.subscribe(),
            hub: self.inner.clone(),
        }
    }

    /// Explicit counterpart to [`EventHub::connect`]; consumes the handle.
    pub fn disconnect(&self, handle: ClientHandle) {
        debug!(client_id = handle.id, "event client disconnected");
        drop(handle);
    }

    /// Fan an event out to every connected client. Returns how many
    /// subscribers received it; zero listeners is not an error.
    pub fn publish(&self, event: RemoteEvent) -> usize {
        let kind = event.kind;
        match self.inner.sender.send(event) {
            Ok(received) => {
                debug!(kind = %kind, receivers = received, "event published");
                received
            }
            Err(_) => 0,
        }
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> RemoteEvent {
        RemoteEvent::new(kind, None, serde_json::json!({}))
    }

    #[tokio::test]
    async fn connected_client_receives_published_events() {
        let hub = EventHub::new(16);
        let mut client = hub.connect();

        let sent = RemoteEvent::new(
            EventKind::TaskCreated,
            Some(Uuid::new_v4()),
            serde_json::json!({"task_name": "Fix crawl errors"}),
        );
        assert_eq!(hub.publish(sent.clone()), 1);

        let got = client.recv().await.unwrap();
        assert_eq!(got, sent);
    }

    #[tokio::test]
    async fn every_client_sees_every_event() {
        let hub = EventHub::new(16);
        let mut a = hub.connect();
        let mut b = hub.connect();
        assert_eq!(hub.client_count(), 2);

        assert_eq!(hub.publish(event(EventKind::DocumentAdded)), 2);
        assert_eq!(a.recv().await.unwrap().kind, EventKind::DocumentAdded);
        assert_eq!(b.recv().await.unwrap().kind, EventKind::DocumentAdded);
    }

    #[tokio::test]
    async fn publish_without_listeners_is_a_no_op() {
        let hub = EventHub::new(16);
        assert_eq!(hub.publish(event(EventKind::TaskDeleted)), 0);
    }

    #[tokio::test]
    async fn disconnect_and_drop_both_deregister() {
        let hub = EventHub::new(16);
        let a = hub.connect();
        let b = hub.connect();
        assert_eq!(hub.client_count(), 2);

        hub.disconnect(a);
        assert_eq!(hub.client_count(), 1);

        drop(b);
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_events() {
        let hub = EventHub::new(16);
        hub.publish(event(EventKind::TaskCreated));

        let mut client = hub.connect();
        hub.publish(event(EventKind::TaskUpdated));
        assert_eq!(client.recv().await.unwrap().kind, EventKind::TaskUpdated);
    }
}
