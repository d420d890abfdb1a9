use std::{fmt::Debug, future::Future, time::Duration};

use log::*;
use redis::{aio::MultiplexedConnection, Client, RedisError};

use crate::traits::{LockError, LockProvider};

/// Lock store backed by Redis `SET NX PX`, shared by every server instance pointing at the same Redis.
#[derive(Clone)]
pub struct RedisLockProvider {
    url: String,
    conn: MultiplexedConnection,
}

impl Debug for RedisLockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RedisLockProvider({})", self.url)
    }
}

impl RedisLockProvider {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(to_lock_error)?;
        let conn = client.get_multiplexed_async_connection().await.map_err(to_lock_error)?;
        info!("🔒️ Connected to Redis lock store at {url}");
        Ok(Self { url: url.to_string(), conn })
    }
}

fn to_lock_error(e: RedisError) -> LockError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        LockError::Unavailable(e.to_string())
    } else {
        LockError::Backend(e.to_string())
    }
}

impl LockProvider for RedisLockProvider {
    fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> impl Future<Output = Result<bool, LockError>> + Send {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let value = format!("{holder}|{}", chrono::Utc::now().timestamp_millis());
        async move {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            if millis == 0 {
                return Err(LockError::InvalidTtl(ttl));
            }
            // SET replies OK on success and nil when the key already exists
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&value)
                .arg("NX")
                .arg("PX")
                .arg(millis)
                .query_async(&mut conn)
                .await
                .map_err(to_lock_error)?;
            trace!("🔒️ SET NX {key} -> {reply:?}");
            Ok(reply.is_some())
        }
    }

    fn release(&self, key: &str) -> impl Future<Output = Result<(), LockError>> + Send {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        async move {
            let _removed: i64 = redis::cmd("DEL").arg(&key).query_async(&mut conn).await.map_err(to_lock_error)?;
            Ok(())
        }
    }
}
