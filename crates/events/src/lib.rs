//! Real-time chat fan-out.
//!
//! - [`ChatBus`] -- per-user rooms backed by `tokio::sync::broadcast`, with
//!   every delivery mirrored to the session store's pub/sub channel.
//! - [`ChatMessage`] -- the envelope; its content is opaque ciphertext.

pub mod bus;

pub use bus::{ChatBus, ChatMessage};
