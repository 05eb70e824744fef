//! Spherical-Earth constants and geodetic distance functions
//!
//! The visual positioning math runs entirely on the spherical Web-Mercator
//! approximation used by slippy-map tiles: a mean Earth radius of 6371 km
//! and an equatorial circumference of 40,075,016.686 m. Over the flight
//! areas the system operates in (a few kilometers), the difference from the
//! WGS-84 ellipsoid is far below the position uncertainty of a visual fix,
//! and staying spherical keeps these functions bit-compatible with the tile
//! pyramid the matcher samples from.

use crate::GeoPoint;

/// Mean Earth radius in kilometers (spherical model)
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Equatorial circumference in meters (Web-Mercator ground resolution base)
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;
/// Side length of a map tile in pixels
pub const TILE_SIZE: f64 = 256.0;
/// Kilometers per degree of latitude, used for coarse bounding boxes
pub const KM_PER_DEGREE: f64 = 111.32;

/// Great-circle distance between two points in kilometers (Haversine).
///
/// Symmetric in its arguments and zero for coincident points.
///
/// # Example
/// ```rust
/// use vps::GeoPoint;
/// use vps::earth::haversine_km;
/// let berlin = GeoPoint::new(52.52, 13.405);
/// let hamburg = GeoPoint::new(53.551, 9.994);
/// let d = haversine_km(berlin, hamburg);
/// assert!((d - 255.0).abs() < 5.0);
/// ```
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat_rad();
    let lat2 = b.lat_rad();

    let s = (dlat / 2.0).sin();
    let c = (dlon / 2.0).sin();
    let h = s * s + lat1.cos() * lat2.cos() * c * c;
    EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

/// Ground resolution of one tile pixel in meters at the given latitude and
/// zoom level.
///
/// Halves with every zoom increment: `meters_per_pixel(lat, z + 1)` is
/// exactly `meters_per_pixel(lat, z) / 2`.
pub fn meters_per_pixel(lat: f64, zoom: u8) -> f64 {
    (EARTH_CIRCUMFERENCE_M * lat.to_radians().cos()) / (TILE_SIZE * f64::powi(2.0, zoom as i32))
}

/// Convert a pixel-space displacement to meters at the given latitude and
/// zoom level.
pub fn pixel_distance_to_meters(dx: f64, dy: f64, lat: f64, zoom: u8) -> f64 {
    (dx * dx + dy * dy).sqrt() * meters_per_pixel(lat, zoom)
}
