use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use log::*;

use crate::traits::{LockError, LockProvider};

#[derive(Debug, Clone)]
struct LockRecord {
    value: String,
    expires_at: Instant,
}

/// A process-local lock store. Only suitable when a single server instance handles accept requests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockProvider {
    records: Arc<Mutex<HashMap<String, LockRecord>>>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        if ttl.is_zero() {
            return Err(LockError::InvalidTtl(ttl));
        }
        let mut records = self.records.lock().map_err(|e| LockError::Backend(e.to_string()))?;
        let now = Instant::now();
        if let Some(existing) = records.get(key) {
            if existing.expires_at > now {
                trace!("🔒️ {key} is held by {}", existing.value);
                return Ok(false);
            }
            debug!("🔒️ Stale lock on {key} ({}) has expired. Treating as absent", existing.value);
        }
        let value = format!("{holder}|{}", chrono::Utc::now().timestamp_millis());
        records.insert(key.to_string(), LockRecord { value, expires_at: now + ttl });
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<(), LockError> {
        let mut records = self.records.lock().map_err(|e| LockError::Backend(e.to_string()))?;
        records.remove(key);
        Ok(())
    }

    /// The current holder of the lock on `key`, if the lock is live.
    pub fn holder(&self, key: &str) -> Option<String> {
        let records = self.records.lock().ok()?;
        records
            .get(key)
            .filter(|r| r.expires_at > Instant::now())
            .and_then(|r| r.value.split('|').next().map(String::from))
    }
}

impl LockProvider for MemoryLockProvider {
    fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> impl Future<Output = Result<bool, LockError>> + Send {
        let store = self.clone();
        let key = key.to_string();
        let holder = holder.to_string();
        async move { store.try_acquire(&key, &holder, ttl) }
    }

    fn release(&self, key: &str) -> impl Future<Output = Result<(), LockError>> + Send {
        let store = self.clone();
        let key = key.to_string();
        async move { store.remove(&key) }
    }
}
