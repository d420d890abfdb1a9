use serde::{Deserialize, Serialize};

use crate::db_types::{Assignment, Order, OrderHistoryEntry, OrderId, OrderStatusType, VendorId};

/// Outcome of the conditional accept transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptanceCommit {
    /// The order moved to `assigned`. `withdrawn` lists the vendors whose pending offers were closed.
    Won { order: Order, withdrawn: Vec<VendorId> },
    /// The guard did not match (the order was no longer awaiting assignment, or the vendor holds no open offer). Nothing
    /// was written.
    Lost(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectionResult {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    /// Open offers left on the order after this rejection.
    pub pending_remaining: i64,
}

impl RejectionResult {
    pub fn offers_exhausted(&self) -> bool {
        self.pending_remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceAssignResult {
    pub order: Order,
    pub previous_vendor: Option<VendorId>,
    /// Vendors who lost an open offer (or a previous assignment) to this force-assignment.
    pub withdrawn: Vec<VendorId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub old_status: OrderStatusType,
    pub order: Order,
    /// Populated when the change closed the order: vendors whose offers or assignment were withdrawn.
    pub withdrawn: Vec<VendorId>,
}

/// Offers on one order that the expiry sweep closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredOffers {
    pub order_id: OrderId,
    pub vendors: Vec<VendorId>,
    pub pending_remaining: i64,
}

impl ExpiredOffers {
    pub fn offers_exhausted(&self) -> bool {
        self.pending_remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub assignments: Vec<Assignment>,
    pub history: Vec<OrderHistoryEntry>,
}

impl OrderDetails {
    pub fn was_offered_to(&self, vendor_id: &VendorId) -> bool {
        self.assignments.iter().any(|a| &a.vendor_id == vendor_id)
    }
}
