//! # Backend contracts
//!
//! This module defines the behaviour that storage back-ends must expose to the dispatch engine.
//!
//! * [`DispatchDatabase`] owns every write: ingesting orders and vendors, creating offers, and the atomic
//!   conditional updates that move an order through its lifecycle. Each method runs in its own transaction.
//! * [`OrderManagement`] is the read side. HTTP endpoints and the real-time handlers only need this.
//! * [`LockProvider`] is the shared, TTL-bounded lock store that arbitrates concurrent accept attempts. It is only a
//!   fast race arbiter. Correctness always rests on the conditional updates in [`DispatchDatabase`].
mod data_objects;
mod dispatch_database;
mod lock_provider;
mod order_management;

pub use data_objects::{AcceptanceCommit, ExpiredOffers, ForceAssignResult, OrderDetails, RejectionResult, StatusChange};
pub use dispatch_database::{DispatchDatabase, DispatchDbError};
pub use lock_provider::{LockError, LockProvider};
pub use order_management::OrderManagement;
