//! Session handling: the token lifecycle and the QR hand-off built on it.

pub mod lifecycle;
pub mod qr;

pub use lifecycle::{IssuedSession, SessionLifecycle};
pub use qr::{PollOutcome, QrConfig, QrSessionMachine};
