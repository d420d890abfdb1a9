//! Lock stores for the accept race.
//!
//! [`RedisLockProvider`] is the shared store for multi-instance deployments. [`MemoryLockProvider`] keeps the records
//! in-process. [`LockBackend`] picks one at runtime. Acquired locks are wrapped in a [`LockGuard`].
mod backend;
mod guard;
mod memory;
mod redis_lock;

pub use backend::LockBackend;
pub use guard::{lock_key, LockGuard};
pub use memory::MemoryLockProvider;
pub use redis_lock::RedisLockProvider;
