//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- bearer token issuance, verification and unverified decoding.

pub mod jwt;
pub mod password;
