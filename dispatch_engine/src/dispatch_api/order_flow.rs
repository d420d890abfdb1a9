use std::fmt::Debug;

use dispatch_common::GeoPoint;
use log::*;

use crate::{
    db_types::{NewHistoryEntry, NewOrder, NewVendor, OfferEndReason, Order, OrderId, OrderStatusType, Vendor},
    dispatch_api::{errors::DispatchError, record_history},
    events::{DispatchEvent, EventProducers},
    traits::DispatchDatabase,
};

/// `OrderFlowApi` is the entry point for the external collaborators: checkout pushes new orders, onboarding pushes
/// vendor records, and payment capture, cancellation and refunds move orders between states.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: DispatchDatabase
{
    /// Stores a new order from checkout. It starts in `pending_payment`.
    pub async fn ingest_order(&self, order: NewOrder) -> Result<Order, DispatchError> {
        GeoPoint::new(order.latitude, order.longitude).map_err(|e| DispatchError::InvalidLocation(e.to_string()))?;
        let order = self.db.insert_order(order).await?;
        debug!("🔄️📦️ Order {} received from customer {}", order.id, order.customer_id);
        let entry = NewHistoryEntry::new(order.id.clone(), None, order.status, "checkout");
        record_history(&self.db, entry).await;
        Ok(order)
    }

    /// Creates or replaces a vendor record.
    pub async fn upsert_vendor(&self, vendor: NewVendor) -> Result<Vendor, DispatchError> {
        GeoPoint::new(vendor.latitude, vendor.longitude).map_err(|e| DispatchError::InvalidLocation(e.to_string()))?;
        if let Some(radius) = vendor.service_radius_km {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(DispatchError::InvalidSearchRadius(radius));
            }
        }
        let vendor = self.db.upsert_vendor(vendor).await?;
        Ok(vendor)
    }

    /// Moves an order to `status` on behalf of an external collaborator.
    ///
    /// The move must be allowed by the order state machine. `assigned` can not be reached this way. Cancelling or
    /// refunding an order withdraws every open offer and takes the order away from its vendor; those vendors are
    /// notified.
    pub async fn modify_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
        actor: &str,
    ) -> Result<Order, DispatchError> {
        let change = self.db.update_order_status(order_id, status, None).await?;
        info!("🔄️📦️ {actor} moved order {order_id} from {} to {status}", change.old_status);
        let mut events =
            vec![DispatchEvent::OrderStatusChanged { order: change.order.clone(), old_status: change.old_status }];
        events.extend(change.withdrawn.iter().map(|v| DispatchEvent::OfferWithdrawn {
            order_id: order_id.clone(),
            vendor_id: v.clone(),
            reason: OfferEndReason::Cancelled,
        }));
        self.producers.publish_all(events).await;
        let entry = NewHistoryEntry::new(order_id.clone(), Some(change.old_status), status, actor);
        record_history(&self.db, entry).await;
        Ok(change.order)
    }
}
