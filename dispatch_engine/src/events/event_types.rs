use serde::{Deserialize, Serialize};

use crate::db_types::{OfferEndReason, Order, OrderId, OrderStatusType, VendorId};

/// Everything the engine announces after a state change has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
    /// A new offer was opened for `vendor_id`.
    OfferCreated { order_id: OrderId, vendor_id: VendorId, latitude: f64, longitude: f64, distance_km: f64 },
    /// A vendor won the accept race.
    OrderAccepted { order: Order, vendor_id: VendorId },
    /// An administrator assigned the order directly.
    OrderAssigned { order: Order, vendor_id: VendorId },
    /// A vendor's offer (or assignment) was closed without them answering it.
    OfferWithdrawn { order_id: OrderId, vendor_id: VendorId, reason: OfferEndReason },
    OfferRejected { order_id: OrderId, vendor_id: VendorId, reason: Option<String> },
    OrderStatusChanged { order: Order, old_status: OrderStatusType },
}

impl DispatchEvent {
    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::OfferCreated { order_id, .. } |
            Self::OfferWithdrawn { order_id, .. } |
            Self::OfferRejected { order_id, .. } => order_id,
            Self::OrderAccepted { order, .. } |
            Self::OrderAssigned { order, .. } |
            Self::OrderStatusChanged { order, .. } => &order.id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OfferCreated { .. } => "OfferCreated",
            Self::OrderAccepted { .. } => "OrderAccepted",
            Self::OrderAssigned { .. } => "OrderAssigned",
            Self::OfferWithdrawn { .. } => "OfferWithdrawn",
            Self::OfferRejected { .. } => "OfferRejected",
            Self::OrderStatusChanged { .. } => "OrderStatusChanged",
        }
    }
}
