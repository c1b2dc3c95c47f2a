//! WebSocket infrastructure for real-time chat delivery.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler used by Axum routes.

mod frames;
mod handler;
mod heartbeat;
pub mod manager;

pub use frames::{ClientFrame, ServerFrame};
pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
