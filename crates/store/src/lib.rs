//! Key/value session store with per-key expiry.
//!
//! [`SessionStore`] is the only shared mutable resource in the system. Every
//! operation is atomic at the single-key level; the compound operations
//! ([`take`](SessionStore::take), [`replace`](SessionStore::replace),
//! [`rotate`](SessionStore::rotate)) are atomic as a whole so the QR state
//! machine and the session lifecycle never need multi-call transactions.
//!
//! - [`MemoryStore`] -- in-process backend for tests and single-node dev.
//! - [`RedisStore`] -- production backend over one multiplexed connection.

pub mod keys;
pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use qrlink_core::error::CoreError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or failed mid-command. Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be interpreted.
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StoreUnavailable(msg),
            StoreError::Corrupt { key, reason } => {
                CoreError::Internal(format!("corrupt store value under {key}: {reason}"))
            }
        }
    }
}

/// Key/value store with TTLs and a minimal publish primitive.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Set `key` to `value`, expiring after `ttl_secs`.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Read `key`; expired keys read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Overwrite `key` only if it currently holds a live value, re-arming its
    /// TTL. Returns `false` (and writes nothing) if the key is absent.
    async fn replace(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// Atomically read and remove `key`. At most one caller observes a value.
    async fn take(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically remove `old_key` and set `new_key`, but only if `old_key`
    /// held a live value. Returns whether the rotation happened.
    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> StoreResult<bool>;

    /// Publish `payload` on `channel`. Returns the number of receivers.
    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize>;

    /// Cheap round-trip used by health checks.
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn unavailable_maps_to_retryable_core_error() {
        let err: CoreError = StoreError::Unavailable("connection refused".into()).into();
        assert_matches!(err, CoreError::StoreUnavailable(ref msg) if msg == "connection refused");
        assert!(err.is_retryable());
    }

    #[test]
    fn corrupt_maps_to_internal() {
        let err: CoreError = StoreError::Corrupt {
            key: "qr:abc".into(),
            reason: "not json".into(),
        }
        .into();
        assert_matches!(err, CoreError::Internal(_));
    }
}
