//! In-process chat fan-out backed by one `tokio::sync::broadcast` channel per
//! user room.
//!
//! [`ChatBus`] is shared via `Arc<ChatBus>`. A message is delivered to the
//! receiver's room and to the sender's room (so the sender's other devices
//! see it too), then mirrored to the session store channel `chat:{user_id}`
//! for subscribers in other processes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qrlink_core::types::UserId;
use qrlink_store::{keys, SessionStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// A chat message. `content` is end-to-end encrypted by the client and never
/// inspected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        sender_id: impl Into<UserId>,
        receiver_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Rooms this message is delivered to, without duplicates.
    fn rooms(&self) -> Vec<&str> {
        if self.sender_id == self.receiver_id {
            vec![self.receiver_id.as_str()]
        } else {
            vec![self.receiver_id.as_str(), self.sender_id.as_str()]
        }
    }
}

// ---------------------------------------------------------------------------
// ChatBus
// ---------------------------------------------------------------------------

/// Default buffer capacity of each room.
const DEFAULT_CAPACITY: usize = 256;

/// Per-user room fan-out.
pub struct ChatBus {
    rooms: RwLock<HashMap<UserId, broadcast::Sender<ChatMessage>>>,
    capacity: usize,
    mirror: Option<Arc<dyn SessionStore>>,
}

impl ChatBus {
    /// Create a bus with a specific room capacity and no store mirror.
    ///
    /// When a room's buffer is full, the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
            mirror: None,
        }
    }

    /// Mirror every delivery to `store`'s pub/sub channels.
    pub fn with_mirror(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.mirror = Some(store);
        self
    }

    /// Join `user_id`'s room, creating it on first use.
    pub async fn join(&self, user_id: &str) -> broadcast::Receiver<ChatMessage> {
        if let Some(sender) = self.rooms.read().await.get(user_id) {
            return sender.subscribe();
        }
        self.rooms
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver `message` to the receiver's and the sender's rooms.
    ///
    /// Returns the number of local receivers reached. Mirror failures are
    /// logged; local delivery has already happened by then.
    pub async fn send(&self, message: &ChatMessage) -> usize {
        let mut delivered = 0;
        {
            let rooms = self.rooms.read().await;
            for room in message.rooms() {
                if let Some(sender) = rooms.get(room) {
                    // An error only means the room has no live receivers.
                    delivered += sender.send(message.clone()).unwrap_or(0);
                }
            }
        }

        if let Some(store) = &self.mirror {
            self.mirror_to_store(store.as_ref(), message).await;
        }

        tracing::debug!(
            message_id = %message.id,
            delivered,
            "Chat message fanned out"
        );
        delivered
    }

    /// Drop rooms nobody is listening to. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }

    /// Number of rooms currently allocated.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn mirror_to_store(&self, store: &dyn SessionStore, message: &ChatMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize chat message");
                return;
            }
        };
        for room in message.rooms() {
            if let Err(e) = store.publish(&keys::chat_channel(room), &payload).await {
                tracing::warn!(error = %e, room, "Failed to mirror chat message to store");
            }
        }
    }
}

impl Default for ChatBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
