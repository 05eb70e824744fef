//! Onboard positioning core for a drone visual positioning system (VPS)
//!
//! This crate implements the fusion and wire-format core of a camera-based
//! positioning system: intermittent visual position fixes (latitude/longitude
//! produced by an external image-matching pipeline, each with an uncertainty
//! scalar) are smoothed and gated through a constant-velocity Kalman filter,
//! extrapolated between fixes, backed by dead reckoning during outages,
//! checked against a geofence, and finally emitted as synthetic GPS frames
//! (NMEA 0183 sentences and MSP `MSP_SET_RAW_GPS` frames) for a flight
//! controller.
//!
//! The core is deliberately small and deterministic: every component is a
//! plain value type owned by the caller, all operations are synchronous and
//! allocation-free on the hot path, and with identical inputs the output is
//! bit-identical across runs. The image-matching pipeline, camera capture,
//! serial I/O, and tile storage are external collaborators; the core only
//! consumes their outputs and produces bytes for the host to write to a UART.
//!
//! ## Crate overview
//!
//! - [earth]: spherical-Earth constants, Haversine distance, and
//!   ground-resolution (meters-per-pixel) calculations.
//! - [tiles]: slippy-map tile addressing, GPS ↔ tile ↔ pixel conversions
//!   and the homography-to-GPS projection that turns an image match into a
//!   position fix.
//! - [kalman]: the 4-state constant-velocity position filter with
//!   Mahalanobis innovation gating.
//! - [dead_reckoning]: constant-velocity extrapolation from the last good
//!   filter snapshot, used when the filter has gone stale.
//! - [geofence]: circular and rectangular safety boundaries.
//! - [fusion]: the source-selection state machine that composes the above
//!   into a single `update()` call per frame.
//! - [nmea]: `$GPGGA` / `$GPRMC` sentence generation.
//! - [msp]: binary MSP `MSP_SET_RAW_GPS` frame generation.
//! - [confidence]: match-quality scoring used to decide whether a fix is
//!   trustworthy enough to output.
//! - [health]: rolling-window system health monitoring.
//! - [rate_limiter]: token-bucket throttling of position output.
//! - [altitude]: altitude-above-ground estimation from the homography scale.
//!
//! ## Units and conventions
//!
//! Positions are WGS-84 geodetic degrees; the filter state carries velocity
//! in degrees/second and converts to meters/second at the API boundary using
//! the small-area approximation 1° latitude ≈ 111,320 m. Web-Mercator
//! operations are undefined above ±85.0511° latitude. Headings are degrees
//! clockwise from true north in [0, 360).

pub mod altitude;
pub mod confidence;
pub mod dead_reckoning;
pub mod earth;
pub mod fusion;
pub mod geofence;
pub mod health;
pub mod kalman;
pub mod msp;
pub mod nmea;
pub mod rate_limiter;
pub mod tiles;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

/// Encoder failure: the caller's buffer cannot hold the requested frame.
///
/// The only error the wire encoders can produce; everything else in the
/// core reports failure through `bool`/`Option` returns.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("output buffer too small ({available} bytes available)")]
    BufferTooSmall { available: usize },
}

/// Meters per degree of latitude (small-area approximation, also applied to
/// longitude after scaling by cos(lat)). Shared by the filter, dead
/// reckoning, and the fusion kinematics so they agree exactly.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A WGS-84 geodetic position in decimal degrees.
///
/// Invariants (`lat` in [-90, 90], `lon` in (-180, 180]) are the caller's
/// responsibility; constructors do not validate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north
    pub lat: f64,
    /// Longitude in degrees, positive east
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    /// Latitude in radians
    pub fn lat_rad(&self) -> f64 {
        self.lat.to_radians()
    }

    /// Longitude in radians
    pub fn lon_rad(&self) -> f64 {
        self.lon.to_radians()
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Horizontal velocity in the local level frame, meters per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    /// Northward velocity in m/s
    pub vn: f64,
    /// Eastward velocity in m/s
    pub ve: f64,
}

impl Velocity {
    pub fn new(vn: f64, ve: f64) -> Self {
        Velocity { vn, ve }
    }

    /// Ground speed in m/s
    pub fn speed(&self) -> f64 {
        (self.vn * self.vn + self.ve * self.ve).sqrt()
    }
}

impl Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Velocity {{ vn: {:.2} m/s, ve: {:.2} m/s }}", self.vn, self.ve)
    }
}
