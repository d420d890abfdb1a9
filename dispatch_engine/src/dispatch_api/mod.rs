//! The public API of the dispatch engine.
//!
//! * [`OrderFlowApi`] ingests orders and vendors and applies externally driven status changes.
//! * [`Dispatcher`] offers orders to nearby vendors, force-assigns them and expires stale offers.
//! * [`AcceptanceCoordinator`] resolves accept races and handles vendor rejections and progress updates.
//! * [`OrderQueryApi`] is read-only.
//!
//! Every state-changing call publishes [`crate::events::DispatchEvent`]s after its transaction commits.
use log::*;

use crate::{db_types::NewHistoryEntry, traits::DispatchDatabase};

mod acceptance;
mod candidate_locator;
mod dispatcher;
mod errors;
mod order_flow;
mod order_query;

pub use acceptance::{AcceptanceCoordinator, LockConfig, DEFAULT_LOCK_PREFIX, DEFAULT_LOCK_TTL};
pub use candidate_locator::{
    rank_candidates,
    CandidateLocator,
    SearchConfig,
    DEFAULT_MAX_CANDIDATES,
    DEFAULT_SEARCH_RADIUS_KM,
};
pub use dispatcher::Dispatcher;
pub use errors::DispatchError;
pub use order_flow::OrderFlowApi;
pub use order_query::OrderQueryApi;

/// Appends to the audit trail. The transition has already committed, so a failure here is logged and swallowed.
pub(crate) async fn record_history<B: DispatchDatabase>(db: &B, entry: NewHistoryEntry) {
    let order_id = entry.order_id.clone();
    if let Err(e) = db.record_history(entry).await {
        warn!("🗃️ Could not write the history entry for order {order_id}. {e}");
    }
}
