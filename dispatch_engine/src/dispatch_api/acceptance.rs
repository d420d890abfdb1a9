use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewHistoryEntry, OfferEndReason, Order, OrderId, OrderStatusType, VendorId},
    dispatch_api::{errors::DispatchError, record_history},
    events::{DispatchEvent, EventProducers},
    locks::{lock_key, LockGuard},
    traits::{AcceptanceCommit, DispatchDatabase, LockProvider, RejectionResult},
};

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_LOCK_PREFIX: &str = "order_lock";

#[derive(Debug, Clone, PartialEq)]
pub struct LockConfig {
    pub ttl: Duration,
    pub prefix: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_LOCK_TTL, prefix: DEFAULT_LOCK_PREFIX.to_string() }
    }
}

/// `AcceptanceCoordinator` handles vendor responses to offers: accepting, rejecting, and moving an assigned order
/// through to completion.
///
/// Accepting is a race. The lock store decides the race quickly: only one vendor at a time gets past
/// [`LockProvider::acquire`]. The database decides it for good: the accept transaction only commits if the order is
/// still awaiting assignment and the vendor still holds an open offer, so a stale or missing lock can never produce two
/// winners.
pub struct AcceptanceCoordinator<B, L> {
    db: B,
    locks: L,
    config: LockConfig,
    producers: EventProducers,
}

impl<B, L> Debug for AcceptanceCoordinator<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AcceptanceCoordinator({})", self.config.prefix)
    }
}

impl<B, L> AcceptanceCoordinator<B, L> {
    pub fn new(db: B, locks: L, config: LockConfig, producers: EventProducers) -> Self {
        Self { db, locks, config, producers }
    }

    pub fn lock_config(&self) -> &LockConfig {
        &self.config
    }
}

impl<B, L> AcceptanceCoordinator<B, L>
where
    B: DispatchDatabase,
    L: LockProvider,
{
    /// Attempts to win the order for `vendor_id`.
    ///
    /// * Another vendor holds the lock: [`DispatchError::LockContention`]. The database is not touched.
    /// * The order was no longer open to this vendor: [`DispatchError::PreconditionFailed`], and the lock is released.
    /// * The lock store or database failed: [`DispatchError::TransientStoreFailure`], and the lock is released.
    ///
    /// On success the lock is left to expire, so late arrivals are turned away before reaching the database. The
    /// resulting events are queued without waiting, so a backed-up subscriber never delays the winner's reply.
    pub async fn accept(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<Order, DispatchError> {
        let key = lock_key(&self.config.prefix, order_id.as_str());
        let holder = format!("{vendor_id}@{}", Utc::now().timestamp_millis());
        if !self.locks.acquire(&key, &holder, self.config.ttl).await? {
            debug!("🔒️ {vendor_id} lost the lock race for order {order_id}");
            return Err(DispatchError::LockContention(order_id.clone()));
        }
        let guard = LockGuard::new(self.locks.clone(), key);
        trace!("🔒️ {holder} holds {}", guard.key());
        let commit = match self.check_vendor(vendor_id).await {
            Ok(()) => self.db.commit_acceptance(order_id, vendor_id).await.map_err(DispatchError::from),
            Err(e) => Err(e),
        };
        match commit {
            Err(e) => {
                let _ = guard.release().await;
                warn!("🔄️🏁️ Accept of order {order_id} by {vendor_id} failed. {e}");
                Err(e)
            },
            Ok(AcceptanceCommit::Won { order, withdrawn }) => {
                guard.keep();
                info!("🔄️🏁️ {vendor_id} won order {order_id}. {} other offers withdrawn", withdrawn.len());
                let mut events = vec![DispatchEvent::OrderAccepted { order: order.clone(), vendor_id: vendor_id.clone() }];
                events.extend(withdrawn.into_iter().map(|v| DispatchEvent::OfferWithdrawn {
                    order_id: order_id.clone(),
                    vendor_id: v,
                    reason: OfferEndReason::Withdrawn,
                }));
                self.producers.try_publish_all(events);
                let entry = NewHistoryEntry::new(
                    order_id.clone(),
                    Some(OrderStatusType::AwaitingAssignment),
                    OrderStatusType::Assigned,
                    vendor_id.as_str(),
                );
                record_history(&self.db, entry).await;
                Ok(order)
            },
            Ok(AcceptanceCommit::Lost(reason)) => {
                let _ = guard.release().await;
                debug!("🔄️🏁️ {vendor_id} lost order {order_id}. {reason}");
                Err(DispatchError::PreconditionFailed(reason))
            },
        }
    }

    /// Declines the vendor's open offer. Other vendors' offers are unaffected.
    pub async fn reject(
        &self,
        order_id: &OrderId,
        vendor_id: &VendorId,
        reason: Option<String>,
    ) -> Result<RejectionResult, DispatchError> {
        let result = self.db.reject_offer(order_id, vendor_id, reason.as_deref()).await?;
        debug!(
            "🔄️🙅️ {vendor_id} rejected order {order_id}. {} offers still open",
            result.pending_remaining
        );
        if result.offers_exhausted() {
            info!("🔄️🙅️ Every open offer for order {order_id} has now been declined");
        }
        let event = DispatchEvent::OfferRejected { order_id: order_id.clone(), vendor_id: vendor_id.clone(), reason };
        self.producers.publish(event).await;
        Ok(result)
    }

    /// Moves an assigned order along `assigned → vendor_accepted → in_progress → completed`. Only the assigned vendor
    /// may do this.
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        vendor_id: &VendorId,
        status: OrderStatusType,
    ) -> Result<Order, DispatchError> {
        if !status.is_vendor_progression() {
            return Err(DispatchError::AuthorizationDenied(format!("Vendors may not set an order to {status}")));
        }
        let change = self.db.update_order_status(order_id, status, Some(vendor_id)).await?;
        info!("🔄️🚚️ {vendor_id} moved order {order_id} from {} to {status}", change.old_status);
        let event = DispatchEvent::OrderStatusChanged { order: change.order.clone(), old_status: change.old_status };
        self.producers.publish(event).await;
        let entry = NewHistoryEntry::new(order_id.clone(), Some(change.old_status), status, vendor_id.as_str());
        record_history(&self.db, entry).await;
        Ok(change.order)
    }

    async fn check_vendor(&self, vendor_id: &VendorId) -> Result<(), DispatchError> {
        let vendor =
            self.db.fetch_vendor(vendor_id).await?.ok_or_else(|| DispatchError::VendorNotFound(vendor_id.clone()))?;
        if vendor.is_assignable() {
            Ok(())
        } else {
            Err(DispatchError::VendorNotEligible(vendor_id.clone(), "The vendor is blocked or not approved".into()))
        }
    }
}
