//! Vendor Dispatch Engine
//!
//! The dispatch engine assigns each paid customer order to exactly one field-service vendor. It finds nearby
//! candidates, offers them the order, and resolves the race when several vendors try to accept the same order at once,
//! guaranteeing at most one winner.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@traits`], [`mod@sqlite`]). The traits describe what a backend must provide; SQLite is the supported
//!    backend. Every state change is a single transaction whose updates are conditional on the state read inside it.
//!    The data types used in the database are defined in [`mod@db_types`] and are public.
//! 2. Lock stores ([`mod@locks`]). A TTL-bounded key/value store (Redis, or in-process) used as a fast arbiter for
//!    accept races.
//! 3. The public API ([`mod@dispatch_api`]): candidate search, dispatch, acceptance, and externally driven order flow.
//!    The order state machine lives in [`mod@order_state`].
//! 4. Events ([`mod@events`]) and real-time fanout ([`mod@fanout`]). Every committed state change is published as a
//!    [`events::DispatchEvent`]; the fanout hook forwards these to the connections subscribed to the affected order or
//!    vendor.
pub mod db_types;
pub mod dispatch_api;
pub mod events;
pub mod fanout;
pub mod locks;
pub mod order_state;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use dispatch_api::{
    AcceptanceCoordinator,
    CandidateLocator,
    DispatchError,
    Dispatcher,
    LockConfig,
    OrderFlowApi,
    OrderQueryApi,
    SearchConfig,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{DispatchDatabase, DispatchDbError, LockError, LockProvider, OrderManagement};
