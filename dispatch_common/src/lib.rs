mod geo;
mod helpers;
mod secret;

pub use geo::{haversine_km, BoundingBox, GeoError, GeoPoint, EARTH_RADIUS_KM};
pub use helpers::{parse_boolean_flag, parse_positive_number};
pub use secret::Secret;
