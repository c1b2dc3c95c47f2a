//! In-process [`SessionStore`] backend.
//!
//! Entries carry a `tokio::time::Instant` deadline and are expired lazily on
//! access; [`MemoryStore::spawn_sweeper`] additionally purges dead entries on
//! a fixed interval so abandoned sessions do not accumulate. Deadlines follow
//! tokio's clock, which lets tests drive expiry with `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{SessionStore, StoreResult};

/// Buffer capacity of each pub/sub channel.
const CHANNEL_CAPACITY: usize = 256;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: &str, ttl_secs: u64) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Mutex-guarded map with TTLs plus `broadcast` channels for publish.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `channel`, creating it on first use.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        if let Some(sender) = self.channels.read().await.get(channel) {
            return sender.subscribe();
        }
        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Drop channels nobody is subscribed to. Returns how many were removed.
    pub async fn prune_channels(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    /// Number of allocated pub/sub channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Spawn a background task that calls [`purge_expired`](Self::purge_expired)
    /// and [`prune_channels`](Self::prune_channels) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Memory store sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = self.purge_expired().await;
                        let pruned = self.prune_channels().await;
                        if purged > 0 || pruned > 0 {
                            tracing::debug!(purged, pruned, "Swept memory store");
                        }
                    }
                }
            }
        })
    }
}

/// Remove `key` if its entry has expired, then report whether it is live.
fn evict_if_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> bool {
    match entries.get(key) {
        Some(entry) if entry.is_live(now) => true,
        Some(_) => {
            entries.remove(key);
            false
        }
        None => false,
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Entry::new(value, ttl_secs));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        if !evict_if_expired(&mut entries, key, Instant::now()) {
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn replace(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        if !evict_if_expired(&mut entries, key, Instant::now()) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value, ttl_secs));
        Ok(true)
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(key);
        Ok(removed
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let existed = entries
            .remove(old_key)
            .is_some_and(|entry| entry.is_live(now));
        if existed {
            entries.insert(new_key.to_string(), Entry::new(value, ttl_secs));
        }
        Ok(existed)
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize> {
        let channels = self.channels.read().await;
        let receivers = match channels.get(channel) {
            // A send error only means nobody is subscribed right now.
            Some(sender) => sender.send(payload.to_string()).unwrap_or(0),
            None => 0,
        };
        Ok(receivers)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
