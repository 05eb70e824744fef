//! Slippy-map tile addressing and projection
//!
//! Conversions between WGS-84 positions, Web-Mercator tile coordinates, and
//! in-tile pixel coordinates, following the `(z, x, y)` convention used by
//! OSM/Mapbox tile pyramids: `x` increases eastward, `y` increases
//! southward, and `(0, 0)` is the north-west corner of the world at each
//! zoom level. Pixels address a single 256×256 tile with the origin at the
//! top-left corner.
//!
//! The Mercator projection is undefined above ±85.0511° latitude; the
//! conversions here clamp rather than fail, so they never panic, but
//! results outside the Mercator band are meaningless.
//!
//! [homography_to_gps] is the bridge from the image-matching pipeline into
//! this coordinate system: it projects the drone image center through the
//! match homography into the pixel space of the matched tile.

use crate::earth::{KM_PER_DEGREE, TILE_SIZE};
use crate::GeoPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::{self, Display};

/// A slippy-map tile address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level, 0..=22
    pub z: u8,
    /// Column, 0..2^z, increasing east
    pub x: u32,
    /// Row, 0..2^z, increasing south
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        TileCoord { z, x, y }
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// A sub-tile pixel coordinate in `[0, 256)`, top-left origin, y down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub fn new(x: f64, y: f64) -> Self {
        Pixel { x, y }
    }
}

/// Fractional global tile coordinate of a position at the given zoom.
fn global_tile_xy(point: GeoPoint, zoom: u8) -> (f64, f64) {
    let n = f64::powi(2.0, zoom as i32);
    let lat_rad = point.lat_rad();
    let x = (point.lon + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// The tile containing a position at the given zoom level.
///
/// Both axes are clamped into `[0, 2^zoom - 1]`, so inputs outside the
/// Mercator latitude band return an edge tile rather than failing.
pub fn gps_to_tile(point: GeoPoint, zoom: u8) -> TileCoord {
    let n = f64::powi(2.0, zoom as i32);
    let max_tile = n - 1.0;
    let (x, y) = global_tile_xy(point, zoom);
    TileCoord {
        z: zoom,
        x: x.floor().clamp(0.0, max_tile) as u32,
        y: y.floor().clamp(0.0, max_tile) as u32,
    }
}

/// Geographic center of a tile (the inverse projection at pixel (128, 128)).
pub fn tile_center(tile: TileCoord) -> GeoPoint {
    tile_pixel_to_gps(tile, Pixel::new(TILE_SIZE / 2.0, TILE_SIZE / 2.0))
}

/// Geographic position of a pixel within a tile.
pub fn tile_pixel_to_gps(tile: TileCoord, pixel: Pixel) -> GeoPoint {
    let n = f64::powi(2.0, tile.z as i32);
    let global_x = tile.x as f64 + pixel.x / TILE_SIZE;
    let global_y = tile.y as f64 + pixel.y / TILE_SIZE;

    GeoPoint {
        lat: (PI * (1.0 - 2.0 * global_y / n)).sinh().atan().to_degrees(),
        lon: global_x / n * 360.0 - 180.0,
    }
}

/// Tile and in-tile pixel of a position at the given zoom level.
pub fn gps_to_tile_pixel(point: GeoPoint, zoom: u8) -> (TileCoord, Pixel) {
    let (x_global, y_global) = global_tile_xy(point, zoom);
    let tile_x = x_global.floor();
    let tile_y = y_global.floor();

    let tile = TileCoord {
        z: zoom,
        x: tile_x as u32,
        y: tile_y as u32,
    };
    let pixel = Pixel {
        x: (x_global - tile_x) * TILE_SIZE,
        y: (y_global - tile_y) * TILE_SIZE,
    };
    (tile, pixel)
}

/// Project the drone image center `(cx, cy)` through a match homography
/// into the matched tile's pixel space and on to a geographic position.
///
/// `h` maps drone-image pixels to tile pixels (row-major 3×3). A degenerate
/// projection (|w| < 1e-10) returns `(0, 0)`, which the filter layer treats
/// as "no fix".
pub fn homography_to_gps(h: &Matrix3<f64>, tile: TileCoord, cx: f64, cy: f64) -> GeoPoint {
    let dx = h[(0, 0)] * cx + h[(0, 1)] * cy + h[(0, 2)];
    let dy = h[(1, 0)] * cx + h[(1, 1)] * cy + h[(1, 2)];
    let dw = h[(2, 0)] * cx + h[(2, 1)] * cy + h[(2, 2)];

    if dw.abs() < 1e-10 {
        return GeoPoint::default();
    }
    tile_pixel_to_gps(tile, Pixel::new(dx / dw, dy / dw))
}

/// Enumerate the tiles covering a circle of `radius_km` around `center`.
///
/// Uses a coarse degrees-per-kilometer bounding box, scanning columns west
/// to east and rows north to south within each column, truncated at `cap`
/// tiles. Intended for prefetching the match candidate set, not for exact
/// coverage.
pub fn tiles_in_radius(center: GeoPoint, radius_km: f64, zoom: u8, cap: usize) -> Vec<TileCoord> {
    let dlat = radius_km / KM_PER_DEGREE;
    let dlon = radius_km / (KM_PER_DEGREE * center.lat_rad().cos());

    let nw = GeoPoint::new(center.lat + dlat, center.lon - dlon);
    let se = GeoPoint::new(center.lat - dlat, center.lon + dlon);

    let t_nw = gps_to_tile(nw, zoom);
    let t_se = gps_to_tile(se, zoom);

    let mut out = Vec::new();
    'scan: for x in t_nw.x..=t_se.x {
        for y in t_nw.y..=t_se.y {
            if out.len() >= cap {
                break 'scan;
            }
            out.push(TileCoord { z: zoom, x, y });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn known_tile_at_zoom_zero() {
        // The whole world is tile 0/0/0
        let t = gps_to_tile(GeoPoint::new(52.52, 13.405), 0);
        assert_eq!(t, TileCoord::new(0, 0, 0));
    }

    #[test]
    fn known_tile_berlin() {
        // Reference value from the OSM slippy-map tile calculator
        let t = gps_to_tile(GeoPoint::new(52.52, 13.405), 17);
        assert_eq!(t.x, 70416);
        assert_eq!(t.y, 42985);
    }

    #[test]
    fn tile_center_round_trip() {
        let tile = TileCoord::new(15, 17600, 10786);
        let center = tile_center(tile);
        assert_eq!(gps_to_tile(center, 15), tile);
    }

    #[test]
    fn pixel_round_trip_across_latitudes() {
        for &lat in &[-85.0, -60.0, -10.0, 0.0, 37.7749, 52.52, 85.0] {
            for &lon in &[-179.9, -122.4194, 0.0, 13.405, 179.9] {
                let p = GeoPoint::new(lat, lon);
                for zoom in [5u8, 12, 15, 20] {
                    let (tile, pixel) = gps_to_tile_pixel(p, zoom);
                    let back = tile_pixel_to_gps(tile, pixel);
                    assert_approx_eq!(back.lat, p.lat, 1e-6);
                    assert_approx_eq!(back.lon, p.lon, 1e-6);
                }
            }
        }
    }

    #[test]
    fn tile_clamped_outside_mercator_band() {
        for zoom in [0u8, 3, 10, 18] {
            let max = (1u32 << zoom) - 1;
            for &(lat, lon) in &[(89.9, 0.0), (-89.9, 0.0), (90.0, 200.0), (-90.0, -200.0)] {
                let t = gps_to_tile(GeoPoint::new(lat, lon), zoom);
                assert!(t.x <= max);
                assert!(t.y <= max);
            }
        }
    }

    #[test]
    fn homography_identity_projects_center_pixel() {
        // Identity homography: image pixel (128,128) is the tile center
        let h = Matrix3::identity();
        let tile = TileCoord::new(15, 17600, 10786);
        let p = homography_to_gps(&h, tile, 128.0, 128.0);
        let center = tile_center(tile);
        assert_approx_eq!(p.lat, center.lat, 1e-9);
        assert_approx_eq!(p.lon, center.lon, 1e-9);
    }

    #[test]
    fn homography_degenerate_returns_origin() {
        // Bottom row zero makes the projective division degenerate
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0);
        let p = homography_to_gps(&h, TileCoord::new(15, 17600, 10786), 128.0, 128.0);
        assert_eq!(p, GeoPoint::default());
    }

    #[test]
    fn tiles_in_radius_contains_center_and_respects_cap() {
        let center = GeoPoint::new(37.0, -122.0);
        let tiles = tiles_in_radius(center, 1.0, 15, 1000);
        assert!(!tiles.is_empty());
        assert!(tiles.contains(&gps_to_tile(center, 15)));

        let capped = tiles_in_radius(center, 1.0, 15, 3);
        assert_eq!(capped.len(), 3);
    }
}
