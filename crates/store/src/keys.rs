//! Key and channel naming for everything the workspace keeps in the store.

use qrlink_core::hashing::sha256_hex;

/// Value stored under a session marker key.
pub const MARKER_VALUE: &str = "valid";

/// Key of the QR session record for `session_id`.
pub fn qr_session(session_id: &str) -> String {
    format!("qr:{session_id}")
}

/// Key of the session marker proving `token` is still honorable for refresh.
///
/// The token is hashed so the store never holds a usable credential.
pub fn session_marker(user_id: &str, token: &str) -> String {
    format!("session:{user_id}:{}", sha256_hex(token.as_bytes()))
}

/// Pub/sub channel carrying chat messages addressed to `user_id`.
pub fn chat_channel(user_id: &str) -> String {
    format!("chat:{user_id}")
}
