//! Wire format of the real-time channel.
//!
//! Every frame is a JSON text frame of the form `{"event": "<NAME>", "data": {...}}` with camelCase payload fields.
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderStatusType, VendorId};

/// Requests a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    AcceptOrder { order_id: OrderId, vendor_id: VendorId },
    #[serde(rename_all = "camelCase")]
    RejectOrder {
        order_id: OrderId,
        vendor_id: VendorId,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateOrderStatus { order_id: OrderId, vendor_id: VendorId, status: OrderStatusType },
    #[serde(rename_all = "camelCase")]
    SubscribeOrder { order_id: OrderId },
}

impl ClientMessage {
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::AcceptOrder { order_id, .. } |
            Self::RejectOrder { order_id, .. } |
            Self::UpdateOrderStatus { order_id, .. } |
            Self::SubscribeOrder { order_id } => order_id,
        }
    }

    /// The vendor the message claims to act for, if any.
    pub fn vendor_id(&self) -> Option<&VendorId> {
        match self {
            Self::AcceptOrder { vendor_id, .. } |
            Self::RejectOrder { vendor_id, .. } |
            Self::UpdateOrderStatus { vendor_id, .. } => Some(vendor_id),
            Self::SubscribeOrder { .. } => None,
        }
    }
}

/// Replies and notifications sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    AcceptOrderSuccess { order_id: OrderId },
    #[serde(rename_all = "camelCase")]
    AcceptOrderFailed { order_id: OrderId, reason: String },
    #[serde(rename_all = "camelCase")]
    RejectOrderSuccess { order_id: OrderId },
    #[serde(rename_all = "camelCase")]
    RejectOrderFailed { order_id: OrderId, reason: String },
    #[serde(rename_all = "camelCase")]
    UpdateStatusSuccess { order_id: OrderId, status: OrderStatusType },
    #[serde(rename_all = "camelCase")]
    UpdateStatusFailed { order_id: OrderId, reason: String },
    #[serde(rename_all = "camelCase")]
    Subscribed { order_id: OrderId },
    #[serde(rename_all = "camelCase")]
    SubscribeFailed { order_id: OrderId, reason: String },
    #[serde(rename_all = "camelCase")]
    OrderAccepted { order_id: OrderId, vendor_id: VendorId },
    #[serde(rename_all = "camelCase")]
    OrderStatusUpdate { order_id: OrderId, status: OrderStatusType },
    #[serde(rename_all = "camelCase")]
    NewOrderOffer { order_id: OrderId, latitude: f64, longitude: f64, distance_km: f64 },
    #[serde(rename_all = "camelCase")]
    OrderAssigned { order_id: OrderId, vendor_id: VendorId },
    #[serde(rename_all = "camelCase")]
    OfferWithdrawn { order_id: OrderId, reason: String },
    #[serde(rename_all = "camelCase")]
    OfferRejected { order_id: OrderId, vendor_id: VendorId },
    Error { reason: String },
}

impl ServerMessage {
    pub fn error<S: Into<String>>(reason: S) -> Self {
        Self::Error { reason: reason.into() }
    }

    /// `true` for the `*_FAILED` replies and `ERROR`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::AcceptOrderFailed { .. } |
                Self::RejectOrderFailed { .. } |
                Self::UpdateStatusFailed { .. } |
                Self::SubscribeFailed { .. } |
                Self::Error { .. }
        )
    }

    pub fn to_json(&self) -> String {
        // Serialising a closed enum of strings and numbers cannot fail
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"event":"ERROR","data":{{"reason":"{e}"}}}}"#))
    }
}
