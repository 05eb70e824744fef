//! Geofence safety boundaries
//!
//! Circular and rectangular fences around a center point, with a safety
//! margin shrinking the usable interior. The fusion layer vetoes any fused
//! position that falls outside the fence, so a bad match can never steer
//! the flight controller beyond the operating area.
//!
//! Rectangular containment works on unsigned Haversine offsets from the
//! center that are then re-signed by comparing coordinates, not a planar
//! approximation, so it agrees with the circular fence at any extent the
//! spherical model supports.

use crate::earth::haversine_km;
use crate::GeoPoint;
use serde::{Deserialize, Serialize};

/// A safety boundary around an operating area. Immutable once constructed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Geofence {
    /// Circle of `radius_km` around `center`
    Circle {
        center: GeoPoint,
        radius_km: f64,
        /// Interior margin subtracted from the radius
        margin_km: f64,
    },
    /// Axis-aligned rectangle of half-extents around `center`
    Rect {
        center: GeoPoint,
        half_lat_km: f64,
        half_lon_km: f64,
        /// Interior margin subtracted from both half-extents
        margin_km: f64,
    },
}

impl Geofence {
    pub fn circle(center: GeoPoint, radius_km: f64, margin_km: f64) -> Self {
        Geofence::Circle {
            center,
            radius_km,
            margin_km,
        }
    }

    pub fn rect(center: GeoPoint, half_lat_km: f64, half_lon_km: f64, margin_km: f64) -> Self {
        Geofence::Rect {
            center,
            half_lat_km,
            half_lon_km,
            margin_km,
        }
    }

    /// North/east offsets of `point` from `center` in signed kilometers.
    fn signed_offsets_km(center: GeoPoint, point: GeoPoint) -> (f64, f64) {
        let mut dlat = haversine_km(center, GeoPoint::new(point.lat, center.lon));
        let mut dlon = haversine_km(center, GeoPoint::new(center.lat, point.lon));
        if point.lat < center.lat {
            dlat = -dlat;
        }
        if point.lon < center.lon {
            dlon = -dlon;
        }
        (dlat, dlon)
    }

    /// Is `point` inside the fence, margin included?
    pub fn contains(&self, point: GeoPoint) -> bool {
        match *self {
            Geofence::Circle {
                center,
                radius_km,
                margin_km,
            } => haversine_km(center, point) <= radius_km - margin_km,
            Geofence::Rect {
                center,
                half_lat_km,
                half_lon_km,
                margin_km,
            } => {
                let (dlat, dlon) = Self::signed_offsets_km(center, point);
                let lat_limit = half_lat_km - margin_km;
                let lon_limit = half_lon_km - margin_km;
                dlat >= -lat_limit && dlat <= lat_limit && dlon >= -lon_limit && dlon <= lon_limit
            }
        }
    }

    /// Distance from `point` to the fence boundary in kilometers, positive
    /// inside and negative outside. The margin is not applied here.
    pub fn distance_km(&self, point: GeoPoint) -> f64 {
        match *self {
            Geofence::Circle {
                center, radius_km, ..
            } => radius_km - haversine_km(center, point),
            Geofence::Rect {
                center,
                half_lat_km,
                half_lon_km,
                ..
            } => {
                let dlat = haversine_km(center, GeoPoint::new(point.lat, center.lon));
                let dlon = haversine_km(center, GeoPoint::new(center.lat, point.lon));
                (half_lat_km - dlat).min(half_lon_km - dlon)
            }
        }
    }
}
