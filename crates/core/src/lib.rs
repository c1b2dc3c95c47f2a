//! Domain types shared across the qrlink workspace: errors, QR session
//! records, user records and small utilities. No I/O lives here.

pub mod error;
pub mod hashing;
pub mod qr;
pub mod types;
pub mod user;
