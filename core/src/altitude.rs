//! Altitude estimation from the match homography
//!
//! When the camera's intrinsics are known, the scale factor between the
//! drone image and the matched satellite tile reveals height above ground:
//! the homography determinant gives the area ratio, its square root the
//! linear scale, and the tile's ground sampling distance anchors it in
//! meters.
//!
//! The chain is:
//!
//! ```text
//! scale      = √|det H|                 (tile pixels per drone pixel)
//! drone_gsd  = scale · tile_gsd          (meters per drone pixel)
//! altitude   = drone_gsd · f · w / s     (f, s in mm; w in pixels)
//! ```
//!
//! where `f` is the focal length, `s` the sensor width, and `w` the capture
//! width. Estimates outside a plausible flight envelope are rejected rather
//! than propagated.

use crate::earth::meters_per_pixel;
use crate::tiles::TileCoord;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Camera lens/sensor parameters.
///
/// Defaults match the Raspberry Pi Camera Module 3 at 640-pixel capture
/// width; calibrate or read from the spec sheet for other hardware.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub focal_length_mm: f64,
    pub sensor_width_mm: f64,
    pub image_width_px: u32,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        CameraIntrinsics {
            focal_length_mm: 4.74,
            sensor_width_mm: 6.287,
            image_width_px: 640,
        }
    }
}

impl CameraIntrinsics {
    /// Horizontal field of view in degrees.
    pub fn fov_deg(&self) -> f64 {
        2.0 * (self.sensor_width_mm / (2.0 * self.focal_length_mm)).atan().to_degrees()
    }
}

/// Altitude estimates outside this envelope are discarded (meters)
const MIN_ALTITUDE_M: f64 = 1.0;
const MAX_ALTITUDE_M: f64 = 10_000.0;

/// Estimate altitude above ground from a drone-to-tile homography.
///
/// `h` maps drone-image pixels to tile pixels; `latitude` corrects the
/// tile's ground sampling distance. Returns `None` for a non-positive
/// determinant or an estimate outside the sane flight envelope.
pub fn altitude_from_homography(
    h: &Matrix3<f64>,
    tile: TileCoord,
    camera: &CameraIntrinsics,
    latitude: f64,
) -> Option<f64> {
    let det = h.determinant();
    if det <= 0.0 {
        return None;
    }

    let scale = det.abs().sqrt();
    let tile_gsd = meters_per_pixel(latitude, tile.z);
    let drone_gsd = scale * tile_gsd;

    let altitude = drone_gsd * camera.focal_length_mm * camera.image_width_px as f64
        / camera.sensor_width_mm;

    if !(MIN_ALTITUDE_M..=MAX_ALTITUDE_M).contains(&altitude) {
        return None;
    }
    Some(altitude)
}

/// Estimate altitude from a known ground distance seen in the drone image.
///
/// Given two matched points a known `true_distance_m` apart on the ground
/// and `matched_distance_px` apart in the drone image, the ground sampling
/// distance, and from it the altitude, follows directly.
pub fn altitude_from_scale(
    matched_distance_px: f64,
    true_distance_m: f64,
    camera: &CameraIntrinsics,
) -> f64 {
    let gsd = true_distance_m / matched_distance_px;
    gsd * camera.focal_length_mm * camera.image_width_px as f64 / camera.sensor_width_mm
}
