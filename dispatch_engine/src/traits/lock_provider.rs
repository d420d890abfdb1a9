use std::{future::Future, time::Duration};

use thiserror::Error;

/// A shared key/value store with TTL-bounded entries, used as the accept-race arbiter.
///
/// A lock record whose TTL has elapsed is treated as absent, so a crashed holder can never wedge an order for longer
/// than the TTL.
pub trait LockProvider: Clone + Send + Sync + 'static {
    /// Succeeds iff no unexpired record exists for `key`, creating one owned by `holder` in the same atomic round trip.
    fn acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, LockError>> + Send;

    /// Removes the record for `key`, whoever holds it.
    fn release(&self, key: &str) -> impl Future<Output = Result<(), LockError>> + Send;
}

#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("Could not reach the lock store. {0}")]
    Unavailable(String),
    #[error("The lock store returned an error. {0}")]
    Backend(String),
    #[error("Invalid lock TTL: {0:?}")]
    InvalidTtl(Duration),
}
