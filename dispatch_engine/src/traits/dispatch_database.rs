use chrono::{DateTime, Utc};
use dispatch_common::BoundingBox;
use thiserror::Error;

use crate::{
    db_types::{
        Assignment,
        Candidate,
        NewHistoryEntry,
        NewOrder,
        NewVendor,
        OfferEndReason,
        Order,
        OrderId,
        OrderStatusType,
        Vendor,
        VendorId,
    },
    order_state::TransitionError,
    traits::{
        AcceptanceCommit,
        ExpiredOffers,
        ForceAssignResult,
        OrderManagement,
        RejectionResult,
        StatusChange,
    },
};

/// This trait defines the write-side behaviour for back-ends supporting the dispatch engine.
///
/// Every method that changes an order is a single atomic transaction whose updates are conditional on the state that
/// was read (or asserted) inside that same transaction. Two callers racing on the same order can therefore never both
/// succeed, regardless of what the lock store says.
#[allow(async_fn_in_trait)]
pub trait DispatchDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order in `pending_payment` status. Fails with [`DispatchDbError::OrderAlreadyExists`] if the id is
    /// taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, DispatchDbError>;

    /// Creates or fully replaces a vendor record.
    async fn upsert_vendor(&self, vendor: NewVendor) -> Result<Vendor, DispatchDbError>;

    /// Approved, unblocked and available vendors whose base lies inside `bounds`.
    async fn fetch_dispatchable_vendors(&self, bounds: &BoundingBox) -> Result<Vec<Vendor>, DispatchDbError>;

    /// Opens a `pending` offer for each candidate, provided the order is still `awaiting_assignment`.
    ///
    /// Vendors who already rejected the order, or whose offer is still open, are skipped. Expired offers are re-opened.
    /// Returns only the offers that were newly opened.
    async fn create_offers(&self, order_id: &OrderId, candidates: &[Candidate])
        -> Result<Vec<Assignment>, DispatchDbError>;

    /// The accept transaction. In one atomic step:
    /// * moves the order to `assigned`, guarded on `status = 'awaiting_assignment'` and on the vendor holding a
    ///   `pending` offer,
    /// * marks that offer `accepted`,
    /// * expires every other open offer on the order.
    ///
    /// If the guard does not match, nothing is written and [`AcceptanceCommit::Lost`] is returned.
    async fn commit_acceptance(&self, order_id: &OrderId, vendor_id: &VendorId)
        -> Result<AcceptanceCommit, DispatchDbError>;

    /// Marks the vendor's `pending` offer as rejected. Fails with [`DispatchDbError::NoPendingOffer`] if there is none.
    async fn reject_offer(
        &self,
        order_id: &OrderId,
        vendor_id: &VendorId,
        reason: Option<&str>,
    ) -> Result<RejectionResult, DispatchDbError>;

    /// Administrator assignment. Permitted from `awaiting_assignment`, or from `assigned` to re-assign. The chosen
    /// vendor's offer becomes `accepted` (it is created if need be) and every other open offer or previous assignment is
    /// expired.
    async fn force_assign(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<ForceAssignResult, DispatchDbError>;

    /// Moves the order to `new_status`, after checking the state machine against the stored status.
    ///
    /// If `acting_vendor` is given, the order must currently be assigned to that vendor. Annulments (cancel, refund)
    /// clear the assigned vendor and expire every open offer.
    ///
    /// Assignment-producing moves are not accepted here; use [`Self::commit_acceptance`] or [`Self::force_assign`].
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        acting_vendor: Option<&VendorId>,
    ) -> Result<StatusChange, DispatchDbError>;

    /// Expires every `pending` offer made before `cutoff`. Orders stay `awaiting_assignment`.
    async fn expire_offers_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ExpiredOffers>, DispatchDbError>;

    /// Expires every `pending` offer on one order.
    async fn expire_offers_for_order(
        &self,
        order_id: &OrderId,
        reason: OfferEndReason,
    ) -> Result<Vec<VendorId>, DispatchDbError>;

    /// Appends an entry to the order's audit trail.
    async fn record_history(&self, entry: NewHistoryEntry) -> Result<(), DispatchDbError>;
}

#[derive(Debug, Clone, Error)]
pub enum DispatchDbError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested vendor {0} does not exist")]
    VendorNotFound(VendorId),
    #[error("Order {0} is {1}, not awaiting assignment")]
    NotAwaitingAssignment(OrderId, OrderStatusType),
    #[error("Vendor {vendor_id} is not assigned to order {order_id}")]
    VendorNotAssigned { order_id: OrderId, vendor_id: VendorId },
    #[error("Vendor {vendor_id} has no open offer for order {order_id}")]
    NoPendingOffer { order_id: OrderId, vendor_id: VendorId },
    #[error("Order {0} was modified concurrently")]
    StaleOrderState(OrderId),
    #[error("{0} can only be reached through acceptance or force-assignment")]
    AssignmentRequired(OrderStatusType),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
}

impl From<sqlx::Error> for DispatchDbError {
    fn from(e: sqlx::Error) -> Self {
        DispatchDbError::DatabaseError(e.to_string())
    }
}
