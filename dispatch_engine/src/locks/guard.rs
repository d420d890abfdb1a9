use log::*;
use tokio::runtime::Handle;

use crate::traits::{LockError, LockProvider};

/// An acquired lock. Dropping an armed guard releases the lock on the current runtime, so early returns and `?` never
/// leave the lock behind. Call [`LockGuard::keep`] to let the lock run out its TTL instead.
pub struct LockGuard<L: LockProvider> {
    provider: L,
    key: String,
    armed: bool,
}

impl<L: LockProvider> LockGuard<L> {
    pub(crate) fn new(provider: L, key: String) -> Self {
        Self { provider, key, armed: true }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lock now and reports the outcome.
    pub async fn release(mut self) -> Result<(), LockError> {
        self.armed = false;
        let result = self.provider.release(&self.key).await;
        match &result {
            Ok(()) => trace!("🔒️ Released {}", self.key),
            Err(e) => warn!("🔒️ Could not release {}. It will expire with its TTL. {e}", self.key),
        }
        result
    }

    /// Disarms the guard. The lock stays in the store until its TTL elapses.
    pub fn keep(mut self) {
        self.armed = false;
        trace!("🔒️ Keeping {} until it expires", self.key);
    }
}

impl<L: LockProvider> Drop for LockGuard<L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let provider = self.provider.clone();
        let key = std::mem::take(&mut self.key);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = provider.release(&key).await {
                        warn!("🔒️ Could not release {key} on drop. It will expire with its TTL. {e}");
                    }
                });
            },
            Err(_) => warn!("🔒️ No runtime to release {key} on drop. It will expire with its TTL."),
        }
    }
}

/// The lock-store key guarding one order.
pub fn lock_key(prefix: &str, order_id: &str) -> String {
    format!("{prefix}:{order_id}")
}
