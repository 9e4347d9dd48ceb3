//! WebSocket subscribers, keyed by the location each one asked for.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::{
    collections::{BTreeSet, HashMap},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::api::AppState;

pub type SessionId = u64;

/// Messages queued per session before new ones are dropped for it.
pub const SESSION_QUEUE: usize = 8;

#[derive(Debug)]
struct Session {
    location: String,
    tx: mpsc::Sender<String>,
}

/// Live sessions. Owned by the server state and shared with the broadcaster.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; messages for it arrive on the returned receiver.
    pub fn register(&self, location: &str) -> (SessionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SESSION_QUEUE);
        self.sessions.write().insert(
            id,
            Session {
                location: location.to_string(),
                tx,
            },
        );
        (id, rx)
    }

    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Distinct locations with at least one subscriber.
    pub fn locations(&self) -> BTreeSet<String> {
        self.sessions
            .read()
            .values()
            .map(|s| s.location.clone())
            .collect()
    }

    /// Queue `message` for one session. Fails if the session is gone or its
    /// queue is full.
    pub fn send(&self, id: SessionId, message: String) -> bool {
        self.sessions
            .read()
            .get(&id)
            .is_some_and(|s| s.tx.try_send(message).is_ok())
    }

    /// Queue `message` for every session on `location`; returns how many got it.
    /// A session with a full queue misses this message. Sessions whose socket
    /// task has gone away are dropped.
    pub fn publish(&self, location: &str, message: &str) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;

        {
            let sessions = self.sessions.read();
            for (id, session) in sessions.iter().filter(|(_, s)| s.location == location) {
                match session.tx.try_send(message.to_string()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(session = id, %location, "session queue full, message dropped");
                    }
                    Err(TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.write();
            for id in dead {
                tracing::debug!(session = id, "dropping closed session");
                sessions.remove(&id);
            }
        }

        delivered
    }
}

/// GET /ws/{location}
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(location): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, location, state))
}

async fn handle_socket(socket: WebSocket, location: String, state: AppState) {
    let registry = state.sessions;
    let (id, mut rx) = registry.register(&location);
    tracing::info!(session = id, %location, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                tracing::debug!(session = id, "websocket send failed: {e}");
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                tracing::info!(session = id, message = %text.as_str(), "websocket message");
                registry.send(id, echo_reply(text.as_str()));
            }
            Ok(Message::Close(reason)) => {
                tracing::info!(session = id, ?reason, "websocket closed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(session = id, "websocket error: {e}");
                break;
            }
        }
    }

    registry.remove(id);
    writer.abort();
}

fn echo_reply(message: &str) -> String {
    format!("[{}] Hello {message}", chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let reg = SessionRegistry::new();
        let (a, _rx_a) = reg.register("TAISHAN");
        let (b, _rx_b) = reg.register("TAISHAN");
        let (_c, _rx_c) = reg.register("JINAN");

        assert_ne!(a, b);
        assert_eq!(reg.len(), 3);
        assert_eq!(
            reg.locations().into_iter().collect::<Vec<_>>(),
            ["JINAN", "TAISHAN"]
        );

        assert!(reg.remove(a));
        assert!(!reg.remove(a));
        assert_eq!(reg.len(), 2);
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_location() {
        let reg = SessionRegistry::new();
        let (_a, mut rx_a) = reg.register("TAISHAN");
        let (_b, mut rx_b) = reg.register("JINAN");

        assert_eq!(reg.publish("TAISHAN", "{\"current\":{}}"), 1);
        assert_eq!(rx_a.recv().await.as_deref(), Some("{\"current\":{}}"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn publish_drops_closed_sessions() {
        let reg = SessionRegistry::new();
        let (_a, rx_a) = reg.register("TAISHAN");
        let (_b, _rx_b) = reg.register("TAISHAN");
        drop(rx_a);

        assert_eq!(reg.publish("TAISHAN", "x"), 1);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn stalled_reader_is_bounded() {
        let reg = SessionRegistry::new();
        let (a, mut rx_a) = reg.register("TAISHAN");
        let (_b, mut rx_b) = reg.register("TAISHAN");

        for _ in 0..SESSION_QUEUE {
            assert_eq!(reg.publish("TAISHAN", "bundle"), 2);
            rx_b.recv().await.unwrap();
        }

        // a never reads: further pushes skip it but keep the session
        assert_eq!(reg.publish("TAISHAN", "bundle"), 1);
        assert!(!reg.send(a, "echo".into()));
        assert_eq!(reg.len(), 2);

        assert_eq!(rx_a.recv().await.as_deref(), Some("bundle"));
        assert_eq!(reg.publish("TAISHAN", "fresh"), 2);
    }

    #[tokio::test]
    async fn send_targets_one_session() {
        let reg = SessionRegistry::new();
        let (a, mut rx_a) = reg.register("TAISHAN");
        let (_b, mut rx_b) = reg.register("TAISHAN");

        assert!(reg.send(a, "hi".into()));
        assert_eq!(rx_a.recv().await.as_deref(), Some("hi"));
        assert!(rx_b.try_recv().is_err());
        assert!(!reg.send(999, "nobody".into()));
    }

    #[test]
    fn echo_format() {
        let reply = echo_reply("ping");
        assert!(reply.starts_with('['));
        assert!(reply.ends_with("] Hello ping"));
        let millis = &reply[1..reply.find(']').unwrap()];
        assert!(millis.parse::<i64>().is_ok());
    }
}
