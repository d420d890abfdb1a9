//! `SqliteDatabase` is a concrete implementation of a dispatch engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dispatch_common::BoundingBox;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{assignments, db_url, history, new_pool, orders, vendors};
use crate::{
    db_types::{
        Assignment,
        Candidate,
        NewHistoryEntry,
        NewOrder,
        NewVendor,
        OfferEndReason,
        Order,
        OrderHistoryEntry,
        OrderId,
        OrderStatusType,
        Vendor,
        VendorId,
    },
    order_state::{check_transition, TransitionError},
    traits::{
        AcceptanceCommit,
        DispatchDatabase,
        DispatchDbError,
        ExpiredOffers,
        ForceAssignResult,
        OrderManagement,
        RejectionResult,
        StatusChange,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let vendor = vendors::fetch_vendor(vendor_id, &mut conn).await?;
        Ok(vendor)
    }

    async fn fetch_assignments_for_order(&self, order_id: &OrderId) -> Result<Vec<Assignment>, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let offers = assignments::fetch_for_order(order_id, &mut conn).await?;
        Ok(offers)
    }

    async fn fetch_order_history(&self, order_id: &OrderId) -> Result<Vec<OrderHistoryEntry>, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let entries = history::fetch_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }
}

impl DispatchDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order(&order.id, &mut tx).await?.is_some() {
            return Err(DispatchDbError::OrderAlreadyExists(order.id));
        }
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn upsert_vendor(&self, vendor: NewVendor) -> Result<Vendor, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let vendor = vendors::upsert_vendor(vendor, &mut conn).await?;
        Ok(vendor)
    }

    async fn fetch_dispatchable_vendors(&self, bounds: &BoundingBox) -> Result<Vec<Vendor>, DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        let vendors = vendors::fetch_dispatchable_in_box(bounds, &mut conn).await?;
        trace!("🗃️ {} dispatchable vendors inside {bounds:?}", vendors.len());
        Ok(vendors)
    }

    async fn create_offers(
        &self,
        order_id: &OrderId,
        candidates: &[Candidate],
    ) -> Result<Vec<Assignment>, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| DispatchDbError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::AwaitingAssignment {
            return Err(DispatchDbError::NotAwaitingAssignment(order_id.clone(), order.status));
        }
        let now = Utc::now();
        let mut opened = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match assignments::open_offer(order_id, candidate, now, &mut tx).await? {
                Some(offer) => opened.push(offer),
                None => trace!("🗃️ Vendor {} already has an answered or open offer on {order_id}", candidate.vendor_id),
            }
        }
        tx.commit().await?;
        debug!("🗃️ {} new offers opened for order {order_id}", opened.len());
        Ok(opened)
    }

    async fn commit_acceptance(
        &self,
        order_id: &OrderId,
        vendor_id: &VendorId,
    ) -> Result<AcceptanceCommit, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        if !orders::assign_if_offered(order_id, vendor_id, now, &mut tx).await? {
            let reason = match orders::fetch_order(order_id, &mut tx).await? {
                None => return Err(DispatchDbError::OrderNotFound(order_id.clone())),
                Some(order) if order.status != OrderStatusType::AwaitingAssignment => {
                    format!("Order {order_id} is already {}", order.status)
                },
                Some(_) => format!("Vendor {vendor_id} has no open offer for order {order_id}"),
            };
            tx.rollback().await?;
            debug!("🗃️ Acceptance of {order_id} by {vendor_id} did not pass its guard. {reason}");
            return Ok(AcceptanceCommit::Lost(reason));
        }
        assignments::accept_offer(order_id, vendor_id, now, &mut tx).await?;
        let withdrawn =
            assignments::withdraw_offers(order_id, Some(vendor_id), false, OfferEndReason::Withdrawn, now, &mut tx)
                .await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| DispatchDbError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} assigned to {vendor_id}. {} competing offers withdrawn", withdrawn.len());
        Ok(AcceptanceCommit::Won { order, withdrawn })
    }

    async fn reject_offer(
        &self,
        order_id: &OrderId,
        vendor_id: &VendorId,
        reason: Option<&str>,
    ) -> Result<RejectionResult, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        if !assignments::reject_offer(order_id, vendor_id, reason, Utc::now(), &mut tx).await? {
            return Err(DispatchDbError::NoPendingOffer { order_id: order_id.clone(), vendor_id: vendor_id.clone() });
        }
        let pending_remaining = assignments::count_pending(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(RejectionResult { order_id: order_id.clone(), vendor_id: vendor_id.clone(), pending_remaining })
    }

    async fn force_assign(&self, order_id: &OrderId, vendor_id: &VendorId) -> Result<ForceAssignResult, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| DispatchDbError::OrderNotFound(order_id.clone()))?;
        let previous_vendor = order.assigned_vendor_id.clone();
        match order.status {
            OrderStatusType::AwaitingAssignment => {},
            OrderStatusType::Assigned if previous_vendor.as_ref() == Some(vendor_id) => {
                debug!("🗃️ Order {order_id} is already assigned to {vendor_id}. Nothing to do");
                tx.rollback().await?;
                return Ok(ForceAssignResult { order, previous_vendor, withdrawn: vec![] });
            },
            OrderStatusType::Assigned => {},
            current => {
                return Err(TransitionError { current, attempted: OrderStatusType::Assigned }.into());
            },
        }
        let now = Utc::now();
        let withdrawn =
            assignments::withdraw_offers(order_id, Some(vendor_id), true, OfferEndReason::Withdrawn, now, &mut tx)
                .await?;
        assignments::upsert_accepted(order_id, vendor_id, now, &mut tx).await?;
        let order = orders::assign_from(order_id, vendor_id, order.status, now, &mut tx)
            .await?
            .ok_or_else(|| DispatchDbError::StaleOrderState(order_id.clone()))?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} force-assigned to {vendor_id}. {} offers withdrawn", withdrawn.len());
        Ok(ForceAssignResult { order, previous_vendor, withdrawn })
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        acting_vendor: Option<&VendorId>,
    ) -> Result<StatusChange, DispatchDbError> {
        if new_status == OrderStatusType::Assigned {
            return Err(DispatchDbError::AssignmentRequired(new_status));
        }
        let mut tx = self.pool.begin().await?;
        let current =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| DispatchDbError::OrderNotFound(order_id.clone()))?;
        if let Some(vendor_id) = acting_vendor {
            if !current.is_assigned_to(vendor_id) {
                return Err(DispatchDbError::VendorNotAssigned {
                    order_id: order_id.clone(),
                    vendor_id: vendor_id.clone(),
                });
            }
        }
        check_transition(current.status, new_status)?;
        let now = Utc::now();
        let order = orders::update_status(order_id, current.status, new_status, now, &mut tx)
            .await?
            .ok_or_else(|| DispatchDbError::StaleOrderState(order_id.clone()))?;
        let withdrawn = if new_status.is_annulment() {
            assignments::withdraw_offers(order_id, None, true, OfferEndReason::Cancelled, now, &mut tx).await?
        } else {
            vec![]
        };
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved from {} to {new_status}", current.status);
        Ok(StatusChange { old_status: current.status, order, withdrawn })
    }

    async fn expire_offers_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ExpiredOffers>, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        let expired = assignments::expire_offers_before(cutoff, Utc::now(), &mut tx).await?;
        let mut result: Vec<ExpiredOffers> = Vec::new();
        for (order_id, vendor_id) in expired {
            match result.iter_mut().find(|e| e.order_id == order_id) {
                Some(entry) => entry.vendors.push(vendor_id),
                None => result.push(ExpiredOffers { order_id, vendors: vec![vendor_id], pending_remaining: 0 }),
            }
        }
        for entry in &mut result {
            entry.pending_remaining = assignments::count_pending(&entry.order_id, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn expire_offers_for_order(
        &self,
        order_id: &OrderId,
        reason: OfferEndReason,
    ) -> Result<Vec<VendorId>, DispatchDbError> {
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order(order_id, &mut tx).await?.is_none() {
            return Err(DispatchDbError::OrderNotFound(order_id.clone()));
        }
        let vendors = assignments::withdraw_offers(order_id, None, false, reason, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(vendors)
    }

    async fn record_history(&self, entry: NewHistoryEntry) -> Result<(), DispatchDbError> {
        let mut conn = self.pool.acquire().await?;
        history::insert_entry(entry, &mut conn).await?;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
