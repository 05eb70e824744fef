//! Constant-velocity dead reckoning
//!
//! Holds a single reference anchor (position, velocity, uncertainty,
//! timestamp) captured whenever the position filter produces a good fix,
//! and extrapolates along that velocity when the filter itself has nothing
//! to offer. Extrapolation is bounded: beyond `max_extrap_s` the anchor is
//! considered stale and no position is produced. The reported uncertainty
//! grows linearly with extrapolation time so downstream consumers can see
//! the estimate degrading.

use crate::{GeoPoint, METERS_PER_DEGREE};

/// Dead-reckoning state: one anchor plus growth parameters.
#[derive(Clone, Copy, Debug)]
pub struct DeadReckoning {
    ref_pos: GeoPoint,
    /// Anchor velocity, m/s north
    vn_mps: f64,
    /// Anchor velocity, m/s east
    ve_mps: f64,
    ref_hdop: f64,
    ref_t: f64,
    /// HDOP added per second of extrapolation
    hdop_growth_rate: f64,
    /// Maximum extrapolation horizon in seconds
    max_extrap_s: f64,
    has_reference: bool,
}

impl DeadReckoning {
    pub fn new(max_extrap_s: f64, hdop_growth_rate: f64) -> Self {
        DeadReckoning {
            ref_pos: GeoPoint::default(),
            vn_mps: 0.0,
            ve_mps: 0.0,
            ref_hdop: 0.0,
            ref_t: 0.0,
            hdop_growth_rate,
            max_extrap_s,
            has_reference: false,
        }
    }

    pub fn has_reference(&self) -> bool {
        self.has_reference
    }

    pub fn max_extrap_s(&self) -> f64 {
        self.max_extrap_s
    }

    pub fn hdop_growth_rate(&self) -> f64 {
        self.hdop_growth_rate
    }

    /// Drop the anchor; parameters are kept.
    pub fn clear(&mut self) {
        self.has_reference = false;
        self.ref_t = 0.0;
    }

    /// Replace the anchor with a fresh fix and its velocity (m/s).
    pub fn update_reference(&mut self, pos: GeoPoint, vn_mps: f64, ve_mps: f64, hdop: f64, t: f64) {
        self.ref_pos = pos;
        self.vn_mps = vn_mps;
        self.ve_mps = ve_mps;
        self.ref_hdop = hdop;
        self.ref_t = t;
        self.has_reference = true;
    }

    /// Extrapolate the anchor to time `t`.
    ///
    /// Returns the extrapolated position and its grown HDOP, or `None` when
    /// there is no anchor, `t` precedes it, or the anchor is older than the
    /// extrapolation horizon.
    pub fn extrapolate(&self, t: f64) -> Option<(GeoPoint, f64)> {
        if !self.has_reference {
            return None;
        }
        let dt = t - self.ref_t;
        if dt < 0.0 || dt > self.max_extrap_s {
            return None;
        }

        let dlat = self.vn_mps / METERS_PER_DEGREE;
        let dlon = self.ve_mps / (METERS_PER_DEGREE * self.ref_pos.lat_rad().cos());

        let pos = GeoPoint::new(
            self.ref_pos.lat + dlat * dt,
            self.ref_pos.lon + dlon * dt,
        );
        Some((pos, self.ref_hdop + self.hdop_growth_rate * dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn no_reference_no_position() {
        let dr = DeadReckoning::new(10.0, 2.0);
        assert!(!dr.has_reference());
        assert!(dr.extrapolate(1.0).is_none());
    }

    #[test]
    fn extrapolates_northward_motion() {
        let mut dr = DeadReckoning::new(10.0, 2.0);
        dr.update_reference(GeoPoint::new(37.0, -122.0), 10.0, 0.0, 1.0, 0.0);

        let (pos, hdop) = dr.extrapolate(2.0).unwrap();
        // 10 m/s north for 2 s is 20 m of latitude
        assert_approx_eq!(pos.lat, 37.0 + 20.0 / METERS_PER_DEGREE, 1e-12);
        assert_approx_eq!(pos.lon, -122.0, 1e-12);
        assert_approx_eq!(hdop, 1.0 + 2.0 * 2.0, 1e-12);
    }

    #[test]
    fn eastward_motion_scaled_by_latitude() {
        let mut dr = DeadReckoning::new(10.0, 1.0);
        dr.update_reference(GeoPoint::new(60.0, 10.0), 0.0, 5.0, 1.0, 0.0);

        let (pos, _) = dr.extrapolate(1.0).unwrap();
        let expected_dlon = 5.0 / (METERS_PER_DEGREE * 60.0_f64.to_radians().cos());
        assert_approx_eq!(pos.lon, 10.0 + expected_dlon, 1e-12);
        assert_approx_eq!(pos.lat, 60.0, 1e-12);
    }

    #[test]
    fn horizon_and_backwards_time_fail() {
        let mut dr = DeadReckoning::new(10.0, 2.0);
        dr.update_reference(GeoPoint::new(37.0, -122.0), 10.0, 0.0, 1.0, 5.0);

        assert!(dr.extrapolate(4.9).is_none());
        assert!(dr.extrapolate(15.0).is_some());
        assert!(dr.extrapolate(15.1).is_none());
    }

    #[test]
    fn clear_keeps_parameters() {
        let mut dr = DeadReckoning::new(12.0, 3.0);
        dr.update_reference(GeoPoint::new(37.0, -122.0), 1.0, 1.0, 1.0, 0.0);
        dr.clear();
        assert!(!dr.has_reference());
        assert!(dr.extrapolate(1.0).is_none());
        assert_eq!(dr.max_extrap_s(), 12.0);
        assert_eq!(dr.hdop_growth_rate(), 3.0);
    }
}
