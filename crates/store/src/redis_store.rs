//! Redis-backed [`SessionStore`].
//!
//! One multiplexed connection is opened by [`RedisStore::connect`] at process
//! start and cloned per command; dropping the store closes it. Compound
//! operations map onto single Redis commands (`SET .. XX`, `GETDEL`) or a Lua
//! script, so each is atomic on the server.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::{SessionStore, StoreError, StoreResult};

/// Delete KEYS[1]; if it existed, set KEYS[2] = ARGV[1] with EX ARGV[2].
const ROTATE_SCRIPT: &str = r"
if redis.call('DEL', KEYS[1]) == 1 then
    redis.call('SET', KEYS[2], ARGV[1], 'EX', ARGV[2])
    return 1
end
return 0
";

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Session store over a shared multiplexed Redis connection.
#[derive(Clone, Debug)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    rotate: redis::Script,
}

impl RedisStore {
    /// Open a connection to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to Redis session store");
        Ok(Self {
            conn,
            rotate: redis::Script::new(ROTATE_SCRIPT),
        })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn replace(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: redis::Value = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn rotate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.rotate.key(old_key);
        invocation.key(new_key).arg(value).arg(ttl_secs);
        let rotated: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(rotated == 1)
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        let receivers: usize = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(receivers)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
