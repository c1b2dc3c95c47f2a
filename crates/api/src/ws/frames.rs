//! JSON frames exchanged over the chat socket.

use qrlink_events::ChatMessage;
use serde::{Deserialize, Serialize};

/// Frames the server pushes to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// A message delivered to the user's room.
    Message(ChatMessage),
    /// An inbound frame was rejected.
    Error { reason: String },
}

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Fan a message out like `POST /chat/send`. The sender is always the
    /// connection's user.
    #[serde(rename_all = "camelCase")]
    SendMessage { receiver_id: String, content: String },
}
