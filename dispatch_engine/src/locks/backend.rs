use std::{future::Future, time::Duration};

use log::*;

use crate::{
    locks::{MemoryLockProvider, RedisLockProvider},
    traits::{LockError, LockProvider},
};

/// The lock store selected at start-up.
#[derive(Debug, Clone)]
pub enum LockBackend {
    Memory(MemoryLockProvider),
    Redis(RedisLockProvider),
}

impl LockBackend {
    /// Connects to Redis if a URL is given. Otherwise falls back to the in-process store.
    pub async fn from_url(url: Option<&str>) -> Result<Self, LockError> {
        match url {
            Some(url) => Ok(Self::Redis(RedisLockProvider::connect(url).await?)),
            None => {
                warn!(
                    "🔒️ No Redis URL configured. Accept locks are held in-process, which is only safe with a single \
                     server instance."
                );
                Ok(Self::Memory(MemoryLockProvider::new()))
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

impl LockProvider for LockBackend {
    fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> impl Future<Output = Result<bool, LockError>> + Send {
        let backend = self.clone();
        let key = key.to_string();
        let holder = holder.to_string();
        async move {
            match backend {
                Self::Memory(p) => p.acquire(&key, &holder, ttl).await,
                Self::Redis(p) => p.acquire(&key, &holder, ttl).await,
            }
        }
    }

    fn release(&self, key: &str) -> impl Future<Output = Result<(), LockError>> + Send {
        let backend = self.clone();
        let key = key.to_string();
        async move {
            match backend {
                Self::Memory(p) => p.release(&key).await,
                Self::Redis(p) => p.release(&key).await,
            }
        }
    }
}
