use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use dispatch_common::GeoPoint;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       VendorId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct VendorId(pub String);

impl From<String> for VendorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VendorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl VendorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle states of an order. Legal moves between them are defined in [`crate::order_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Received from checkout; payment has not been captured yet.
    PendingPayment,
    /// Paid for and waiting for a vendor to take it on.
    AwaitingAssignment,
    /// A vendor has won the order (by accepting an offer, or by administrator force-assignment).
    Assigned,
    /// The assigned vendor has confirmed they will do the job.
    VendorAccepted,
    /// Work has started on site.
    InProgress,
    Completed,
    Cancelled,
    Refunded,
    /// Payment capture failed. The customer may retry.
    PaymentFailed,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 9] = [
        OrderStatusType::PendingPayment,
        OrderStatusType::AwaitingAssignment,
        OrderStatusType::Assigned,
        OrderStatusType::VendorAccepted,
        OrderStatusType::InProgress,
        OrderStatusType::Completed,
        OrderStatusType::Cancelled,
        OrderStatusType::Refunded,
        OrderStatusType::PaymentFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::PendingPayment => "pending_payment",
            OrderStatusType::AwaitingAssignment => "awaiting_assignment",
            OrderStatusType::Assigned => "assigned",
            OrderStatusType::VendorAccepted => "vendor_accepted",
            OrderStatusType::InProgress => "in_progress",
            OrderStatusType::Completed => "completed",
            OrderStatusType::Cancelled => "cancelled",
            OrderStatusType::Refunded => "refunded",
            OrderStatusType::PaymentFailed => "payment_failed",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatusType::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| ConversionError(format!("Invalid order status: {s}")))
    }
}

//--------------------------------------     OfferStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferStatus::Pending => write!(f, "pending"),
            OfferStatus::Accepted => write!(f, "accepted"),
            OfferStatus::Rejected => write!(f, "rejected"),
            OfferStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Why an offer stopped being open without the vendor answering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferEndReason {
    /// Another vendor won the order, or an administrator assigned it elsewhere.
    Withdrawn,
    /// Nobody answered in time.
    Timeout,
    /// The order was cancelled or refunded.
    Cancelled,
}

impl OfferEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferEndReason::Withdrawn => "withdrawn",
            OfferEndReason::Timeout => "timeout",
            OfferEndReason::Cancelled => "cancelled",
        }
    }
}

impl Display for OfferEndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------    ApprovalStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub status: OrderStatusType,
    pub latitude: f64,
    pub longitude: f64,
    /// Postal code (or similar) of the job site, if known.
    pub service_area: Option<String>,
    /// Non-null exactly when the status is one of assigned, vendor_accepted, in_progress or completed.
    pub assigned_vendor_id: Option<VendorId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn location(&self) -> GeoPoint {
        GeoPoint { latitude: self.latitude, longitude: self.longitude }
    }

    pub fn is_assigned_to(&self, vendor_id: &VendorId) -> bool {
        self.assigned_vendor_id.as_ref() == Some(vendor_id)
    }
}

/// An order as it arrives from checkout. New orders always start in `pending_payment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(id: OrderId, customer_id: S, latitude: f64, longitude: f64) -> Self {
        Self { id, customer_id: customer_id.into(), latitude, longitude, service_area: None, created_at: Utc::now() }
    }

    pub fn with_service_area<S: Into<String>>(mut self, area: S) -> Self {
        self.service_area = Some(area.into());
        self
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint { latitude: self.latitude, longitude: self.longitude }
    }
}

//--------------------------------------        Vendor         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub approval_status: ApprovalStatus,
    pub is_blocked: bool,
    pub is_available: bool,
    pub latitude: f64,
    pub longitude: f64,
    /// If set, the vendor only takes jobs within this many km of their base.
    pub service_radius_km: Option<f64>,
    pub service_areas: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn location(&self) -> GeoPoint {
        GeoPoint { latitude: self.latitude, longitude: self.longitude }
    }

    /// Approved, unblocked and currently taking work.
    pub fn is_dispatchable(&self) -> bool {
        self.is_assignable() && self.is_available
    }

    /// The weaker check used for administrator force-assignment, which ignores the availability toggle.
    pub fn is_assignable(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved && !self.is_blocked
    }

    pub fn serves_area(&self, area: &str) -> bool {
        self.service_areas.0.iter().any(|a| a.eq_ignore_ascii_case(area))
    }

    /// Whether a job `distance_km` away, in `area`, falls inside this vendor's declared coverage. Vendors that declare
    /// neither a service area nor a radius are limited by the dispatcher's search radius only.
    pub fn covers(&self, area: Option<&str>, distance_km: f64) -> bool {
        if let Some(area) = area {
            if self.serves_area(area) {
                return true;
            }
        }
        match self.service_radius_km {
            Some(radius) => distance_km <= radius,
            None => self.service_areas.0.is_empty(),
        }
    }
}

/// Vendor record as pushed by the onboarding system. Upserts replace every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVendor {
    pub id: VendorId,
    pub name: String,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub service_radius_km: Option<f64>,
    #[serde(default)]
    pub service_areas: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl NewVendor {
    /// An approved, available vendor with no coverage restrictions.
    pub fn approved<S: Into<String>>(id: VendorId, name: S, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            approval_status: ApprovalStatus::Approved,
            is_blocked: false,
            is_available: true,
            latitude,
            longitude,
            service_radius_km: None,
            service_areas: vec![],
        }
    }

    pub fn blocked(mut self) -> Self {
        self.is_blocked = true;
        self
    }

    pub fn with_radius(mut self, radius_km: f64) -> Self {
        self.service_radius_km = Some(radius_km);
        self
    }

    pub fn with_service_areas(mut self, areas: Vec<String>) -> Self {
        self.service_areas = areas;
        self
    }

    pub fn with_approval(mut self, status: ApprovalStatus) -> Self {
        self.approval_status = status;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }
}

//--------------------------------------      Assignment       ---------------------------------------------------------
/// One row per (order, vendor) offer.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub status: OfferStatus,
    pub distance_km: Option<f64>,
    pub reason: Option<String>,
    pub offered_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Candidate        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub vendor_id: VendorId,
    pub distance_km: f64,
}

//--------------------------------------     OrderHistory      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderHistoryEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub from_status: Option<OrderStatusType>,
    pub to_status: OrderStatusType,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub order_id: OrderId,
    pub from_status: Option<OrderStatusType>,
    pub to_status: OrderStatusType,
    pub actor: String,
    pub note: Option<String>,
}

impl NewHistoryEntry {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        from_status: Option<OrderStatusType>,
        to_status: OrderStatusType,
        actor: S,
    ) -> Self {
        Self { order_id, from_status, to_status, actor: actor.into(), note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}
