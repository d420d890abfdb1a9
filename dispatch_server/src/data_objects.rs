use dispatch_engine::db_types::{ApprovalStatus, NewVendor, OrderId, OrderStatusType, VendorId};
use serde::{Deserialize, Serialize};

/// Optional search radius for candidate queries and dispatch requests.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RadiusParams {
    #[serde(default)]
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignParams {
    pub vendor_id: VendorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusParams {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredOffersResult {
    pub order_id: OrderId,
    pub expired: Vec<VendorId>,
}

/// A vendor record as pushed by the onboarding system. The vendor id comes from the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRecord {
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

impl VendorRecord {
    pub fn into_new_vendor(self, id: VendorId) -> NewVendor {
        NewVendor {
            id,
            name: self.name,
            approval_status: self.approval_status,
            is_blocked: self.is_blocked,
            is_available: self.is_available,
            latitude: self.latitude,
            longitude: self.longitude,
            service_radius_km: self.service_radius_km,
            service_areas: self.service_areas,
        }
    }
}
