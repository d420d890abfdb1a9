use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType, VendorId},
    order_state::TransitionError,
    traits::{DispatchDbError, LockError},
};

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Another vendor holds the accept lock on this order. Never retried.
    #[error("Order {0} is already being accepted by another vendor")]
    LockContention(OrderId),
    /// The order was no longer open to this vendor when the transaction ran. Reported as a lost race.
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("Not authorised. {0}")]
    AuthorizationDenied(String),
    /// The lock store or the database could not be reached. Surfaced without an internal retry.
    #[error("Temporary storage failure. {0}")]
    TransientStoreFailure(String),
    #[error("An order cannot move from {current} to {attempted}")]
    InvalidTransition { current: OrderStatusType, attempted: OrderStatusType },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Vendor {0} does not exist")]
    VendorNotFound(VendorId),
    #[error("Vendor {0} cannot take orders. {1}")]
    VendorNotEligible(VendorId, String),
    #[error("Vendor {vendor_id} has no open offer for order {order_id}")]
    NoPendingOffer { order_id: OrderId, vendor_id: VendorId },
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Order {0} is {1}, not awaiting assignment")]
    OrderNotAssignable(OrderId, OrderStatusType),
    #[error("Orders can only become {0} by acceptance or force-assignment")]
    UnsupportedStatusChange(OrderStatusType),
    #[error("Search radius must be a positive number of kilometres, not {0}")]
    InvalidSearchRadius(f64),
    #[error("Invalid location. {0}")]
    InvalidLocation(String),
}

impl DispatchError {
    /// `true` when the caller simply lost the race for an order. Clients report these as a lost race rather than an
    /// error.
    pub fn is_lost_race(&self) -> bool {
        matches!(self, Self::LockContention(_) | Self::PreconditionFailed(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }
}

impl From<DispatchDbError> for DispatchError {
    fn from(e: DispatchDbError) -> Self {
        match e {
            DispatchDbError::DatabaseError(s) => Self::TransientStoreFailure(s),
            DispatchDbError::OrderAlreadyExists(id) => Self::OrderAlreadyExists(id),
            DispatchDbError::OrderNotFound(id) => Self::OrderNotFound(id),
            DispatchDbError::VendorNotFound(id) => Self::VendorNotFound(id),
            DispatchDbError::NotAwaitingAssignment(id, status) => Self::OrderNotAssignable(id, status),
            DispatchDbError::VendorNotAssigned { order_id, vendor_id } => {
                Self::AuthorizationDenied(format!("Vendor {vendor_id} is not assigned to order {order_id}"))
            },
            DispatchDbError::NoPendingOffer { order_id, vendor_id } => Self::NoPendingOffer { order_id, vendor_id },
            DispatchDbError::StaleOrderState(id) => {
                Self::PreconditionFailed(format!("Order {id} changed while the request was being processed"))
            },
            DispatchDbError::AssignmentRequired(status) => Self::UnsupportedStatusChange(status),
            DispatchDbError::InvalidTransition(e) => e.into(),
        }
    }
}

impl From<TransitionError> for DispatchError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition { current: e.current, attempted: e.attempted }
    }
}

impl From<LockError> for DispatchError {
    fn from(e: LockError) -> Self {
        Self::TransientStoreFailure(e.to_string())
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(e: sqlx::Error) -> Self {
        Self::TransientStoreFailure(e.to_string())
    }
}
