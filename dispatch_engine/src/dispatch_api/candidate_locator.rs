use dispatch_common::GeoPoint;
use log::*;

use crate::{
    db_types::{Candidate, OrderId, Vendor},
    dispatch_api::errors::DispatchError,
    traits::DispatchDatabase,
};

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub radius_km: f64,
    pub max_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { radius_km: DEFAULT_SEARCH_RADIUS_KM, max_candidates: DEFAULT_MAX_CANDIDATES }
    }
}

/// Finds the vendors that may be offered an order.
#[derive(Clone)]
pub struct CandidateLocator<B> {
    db: B,
    config: SearchConfig,
}

impl<B> CandidateLocator<B> {
    pub fn new(db: B, config: SearchConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }
}

impl<B> CandidateLocator<B>
where B: DispatchDatabase
{
    /// Candidates for a stored order, using the order's job location and service area. `radius_override` replaces the
    /// configured search radius.
    pub async fn candidates_for_order(
        &self,
        order_id: &OrderId,
        radius_override: Option<f64>,
    ) -> Result<Vec<Candidate>, DispatchError> {
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| DispatchError::OrderNotFound(order_id.clone()))?;
        let origin = GeoPoint::new(order.latitude, order.longitude)
            .map_err(|e| DispatchError::InvalidLocation(e.to_string()))?;
        let radius = radius_override.unwrap_or(self.config.radius_km);
        let candidates = self.find_candidates(&origin, order.service_area.as_deref(), radius).await?;
        debug!("🧭️ {} candidates within {radius} km of order {order_id}", candidates.len());
        Ok(candidates)
    }

    /// Dispatchable vendors within `radius_km` of `origin`, nearest first. An empty list is a normal outcome.
    pub async fn find_candidates(
        &self,
        origin: &GeoPoint,
        service_area: Option<&str>,
        radius_km: f64,
    ) -> Result<Vec<Candidate>, DispatchError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(DispatchError::InvalidSearchRadius(radius_km));
        }
        let bounds = origin.bounding_box(radius_km);
        let vendors = self.db.fetch_dispatchable_vendors(&bounds).await?;
        trace!("🧭️ {} vendors inside the search box around {origin:?}", vendors.len());
        Ok(rank_candidates(origin, service_area, radius_km, self.config.max_candidates, &vendors))
    }
}

/// Filters and orders the vendors for an offer round.
///
/// A vendor is kept if it is dispatchable, lies within `radius_km` of `origin`, and either serves `service_area` or has
/// the job inside its own service radius. The result is sorted by distance (ties broken by vendor id), contains each
/// vendor once, and is capped at `max_candidates`.
pub fn rank_candidates(
    origin: &GeoPoint,
    service_area: Option<&str>,
    radius_km: f64,
    max_candidates: usize,
    vendors: &[Vendor],
) -> Vec<Candidate> {
    let mut candidates = vendors
        .iter()
        .filter(|v| v.is_dispatchable())
        .filter_map(|v| {
            let distance_km = origin.distance_km(&v.location());
            (distance_km <= radius_km && v.covers(service_area, distance_km))
                .then(|| Candidate { vendor_id: v.id.clone(), distance_km })
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km).then_with(|| a.vendor_id.cmp(&b.vendor_id)));
    candidates.dedup_by(|a, b| a.vendor_id == b.vendor_id);
    candidates.truncate(max_candidates);
    candidates
}
