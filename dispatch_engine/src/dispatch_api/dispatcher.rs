use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Candidate, NewHistoryEntry, OfferEndReason, Order, OrderId, OrderStatusType, VendorId},
    dispatch_api::{
        candidate_locator::{CandidateLocator, SearchConfig},
        errors::DispatchError,
        record_history,
    },
    events::{DispatchEvent, EventProducers},
    traits::{DispatchDatabase, ExpiredOffers},
};

/// `Dispatcher` creates offers for paid orders, lets administrators assign orders directly, and expires offers that
/// nobody answered.
pub struct Dispatcher<B> {
    db: B,
    locator: CandidateLocator<B>,
    producers: EventProducers,
}

impl<B> Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dispatcher")
    }
}

impl<B: Clone> Dispatcher<B> {
    pub fn new(db: B, search: SearchConfig, producers: EventProducers) -> Self {
        let locator = CandidateLocator::new(db.clone(), search);
        Self { db, locator, producers }
    }

    pub fn locator(&self) -> &CandidateLocator<B> {
        &self.locator
    }
}

impl<B> Dispatcher<B>
where B: DispatchDatabase
{
    /// Offers the order to every nearby candidate.
    ///
    /// The order must be awaiting assignment. Vendors who already rejected the order, or who hold an open offer for it,
    /// are not offered it again. Returns the candidates that received a new offer; an empty list leaves the order
    /// awaiting assignment.
    pub async fn dispatch_order(
        &self,
        order_id: &OrderId,
        radius_override: Option<f64>,
    ) -> Result<Vec<Candidate>, DispatchError> {
        let order = self.fetch_order(order_id).await?;
        if order.status != OrderStatusType::AwaitingAssignment {
            return Err(DispatchError::OrderNotAssignable(order.id, order.status));
        }
        let candidates = self.locator.candidates_for_order(order_id, radius_override).await?;
        if candidates.is_empty() {
            info!("🔄️📣️ No vendors are available for order {order_id}. It remains awaiting assignment.");
            return Ok(vec![]);
        }
        let offers = self.db.create_offers(order_id, &candidates).await?;
        let offered = offers
            .iter()
            .map(|o| Candidate { vendor_id: o.vendor_id.clone(), distance_km: o.distance_km.unwrap_or_default() })
            .collect::<Vec<_>>();
        let events = offered.iter().map(|c| DispatchEvent::OfferCreated {
            order_id: order_id.clone(),
            vendor_id: c.vendor_id.clone(),
            latitude: order.latitude,
            longitude: order.longitude,
            distance_km: c.distance_km,
        });
        self.producers.publish_all(events).await;
        info!("🔄️📣️ Order {order_id} offered to {} of {} candidates", offered.len(), candidates.len());
        Ok(offered)
    }

    /// Assigns the order to `vendor_id` on administrator authority, bypassing the accept lock.
    ///
    /// The vendor must be approved and unblocked. The order may be awaiting assignment, or already assigned (in which
    /// case it is re-assigned). Every other open offer, and any previous assignment, is withdrawn.
    pub async fn force_assign(&self, order_id: &OrderId, vendor_id: &VendorId, actor: &str) -> Result<Order, DispatchError> {
        let vendor =
            self.db.fetch_vendor(vendor_id).await?.ok_or_else(|| DispatchError::VendorNotFound(vendor_id.clone()))?;
        if !vendor.is_assignable() {
            let reason = if vendor.is_blocked {
                "The vendor is blocked".to_string()
            } else {
                format!("The vendor's approval status is {}", vendor.approval_status)
            };
            return Err(DispatchError::VendorNotEligible(vendor_id.clone(), reason));
        }
        let result = self.db.force_assign(order_id, vendor_id).await?;
        if result.previous_vendor.as_ref() == Some(vendor_id) && result.withdrawn.is_empty() {
            debug!("🔄️🛠️ Order {order_id} was already assigned to {vendor_id}");
            return Ok(result.order);
        }
        let from = match result.previous_vendor {
            Some(_) => OrderStatusType::Assigned,
            None => OrderStatusType::AwaitingAssignment,
        };
        let mut events = vec![DispatchEvent::OrderAssigned { order: result.order.clone(), vendor_id: vendor_id.clone() }];
        events.extend(result.withdrawn.iter().map(|v| DispatchEvent::OfferWithdrawn {
            order_id: order_id.clone(),
            vendor_id: v.clone(),
            reason: OfferEndReason::Withdrawn,
        }));
        self.producers.publish_all(events).await;
        let mut entry = NewHistoryEntry::new(order_id.clone(), Some(from), OrderStatusType::Assigned, actor);
        if let Some(previous) = &result.previous_vendor {
            entry = entry.with_note(format!("Re-assigned from {previous} to {vendor_id}"));
        }
        record_history(&self.db, entry).await;
        info!("🔄️🛠️ Order {order_id} force-assigned to {vendor_id} by {actor}");
        Ok(result.order)
    }

    /// Expires every pending offer older than `older_than`. Orders stay awaiting assignment; the result says, per
    /// order, whether any offers are left open so the caller can widen the search.
    pub async fn expire_stale_offers(&self, older_than: Duration) -> Result<Vec<ExpiredOffers>, DispatchError> {
        let cutoff = chrono::Duration::from_std(older_than).ok().and_then(|d| Utc::now().checked_sub_signed(d));
        let Some(cutoff) = cutoff else {
            warn!("🔄️⏳️ Offer age {older_than:?} is out of range. Nothing to expire.");
            return Ok(vec![]);
        };
        let expired = self.db.expire_offers_before(cutoff).await?;
        let events = expired.iter().flat_map(|e| {
            e.vendors.iter().map(|v| DispatchEvent::OfferWithdrawn {
                order_id: e.order_id.clone(),
                vendor_id: v.clone(),
                reason: OfferEndReason::Timeout,
            })
        });
        self.producers.publish_all(events.collect::<Vec<_>>()).await;
        for e in expired.iter().filter(|e| e.offers_exhausted()) {
            info!("🔄️⏳️ Every offer for order {} has lapsed. It is still awaiting assignment.", e.order_id);
        }
        Ok(expired)
    }

    /// Expires the pending offers on a single order.
    pub async fn expire_offers_for_order(&self, order_id: &OrderId) -> Result<Vec<VendorId>, DispatchError> {
        let vendors = self.db.expire_offers_for_order(order_id, OfferEndReason::Timeout).await?;
        let events = vendors.iter().map(|v| DispatchEvent::OfferWithdrawn {
            order_id: order_id.clone(),
            vendor_id: v.clone(),
            reason: OfferEndReason::Timeout,
        });
        self.producers.publish_all(events.collect::<Vec<_>>()).await;
        debug!("🔄️⏳️ {} offers on order {order_id} expired", vendors.len());
        Ok(vendors)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, DispatchError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| DispatchError::OrderNotFound(order_id.clone()))
    }
}
