//! Great-circle helpers used to rank vendors by straight-line distance from a job site.
//!
//! Distances are computed with the haversine formula on a spherical earth of radius [`EARTH_RADIUS_KM`]. This is
//! accurate to well within a percent at the distances a field-service dispatcher cares about.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
// Great circles bow poleward of a parallel, so the longitude span is padded slightly
const BOX_MARGIN: f64 = 1.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Latitude {0} is outside the range [-90, 90]")]
    InvalidLatitude(f64),
    #[error("Longitude {0} is outside the range [-180, 180]")]
    InvalidLongitude(f64),
}

//--------------------------------------       GeoPoint       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    /// Great-circle distance to `other`, in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self, other)
    }

    /// A latitude/longitude box that fully contains the circle of `radius_km` around this point. Used as a cheap
    /// index-friendly pre-filter; callers must still check the exact distance.
    pub fn bounding_box(&self, radius_km: f64) -> BoundingBox {
        let radius_km = radius_km * BOX_MARGIN;
        let d_lat = radius_km / KM_PER_DEGREE;
        let min_lat = (self.latitude - d_lat).max(-90.0);
        let max_lat = (self.latitude + d_lat).min(90.0);
        let cos_lat = self.latitude.to_radians().cos();
        // A circle that reaches a pole spans every meridian
        if max_lat >= 90.0 || min_lat <= -90.0 || cos_lat < 1e-6 {
            return BoundingBox { min_lat, max_lat, min_lon: -180.0, max_lon: 180.0 };
        }
        let d_lon = radius_km / (KM_PER_DEGREE * cos_lat);
        let (min_lon, max_lon) = (self.longitude - d_lon, self.longitude + d_lon);
        // Boxes that wrap the antimeridian just widen to the full longitude range
        if min_lon < -180.0 || max_lon > 180.0 {
            BoundingBox { min_lat, max_lat, min_lon: -180.0, max_lon: 180.0 }
        } else {
            BoundingBox { min_lat, max_lat, min_lon, max_lon }
        }
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

//--------------------------------------     BoundingBox      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.latitude) && (self.min_lon..=self.max_lon).contains(&p.longitude)
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
