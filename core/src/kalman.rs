//! Constant-velocity position filter with innovation gating
//!
//! A 4-state Kalman filter over `[lat, lon, vlat, vlon]` (degrees and
//! degrees/second). The motion model is constant velocity and the
//! measurement model is the identity on the position states, so the
//! "extended" machinery degenerates to a linear filter, but the gating,
//! gap-reset, and unit conventions here define the numerical contract the
//! rest of the positioning core is built against.
//!
//! Visual fixes arrive intermittently (a few Hz at best, with dropouts),
//! each with an HDOP-style uncertainty scalar that scales the measurement
//! noise. Measurements inconsistent with the filter's own uncertainty are
//! rejected by a Mahalanobis gate; a rejected measurement still advances
//! the predicted state so that time never runs backwards inside the filter.
//!
//! All matrix arithmetic is on fixed-size `nalgebra` types; nothing here
//! allocates.
//!
//! ## Units
//!
//! `process_noise` is the continuous white-noise acceleration intensity in
//! the degree-based state space (deg²/s³ entering the standard kinematic
//! Q blocks); `measurement_noise` is the position measurement variance in
//! deg² at HDOP 1.0, scaled by hdop². Do not mix meter-based tunings into
//! these fields.

use crate::{GeoPoint, Velocity, METERS_PER_DEGREE};
use nalgebra::{Matrix2, Matrix4, Matrix4x2, Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// Filter tuning parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EkfConfig {
    /// Process noise intensity in the degree state space
    pub process_noise: f64,
    /// Position measurement variance (deg²) at HDOP 1.0
    pub measurement_noise: f64,
    /// Mahalanobis distance above which a measurement is rejected
    pub gate_threshold: f64,
    /// Measurement gap (seconds) beyond which the filter resets and
    /// re-initializes instead of integrating the gap
    pub max_gap_s: f64,
}

impl Default for EkfConfig {
    fn default() -> Self {
        EkfConfig {
            process_noise: 1e-10,
            measurement_noise: 1e-8,
            gate_threshold: 5.0,
            max_gap_s: 30.0,
        }
    }
}

/// Covariance assigned to every diagonal entry at (re-)initialization
const INIT_VARIANCE: f64 = 1e-6;

/// 4-state constant-velocity position filter.
///
/// Created uninitialized; the first call to [`update`](PositionEkf::update)
/// initializes the state from the measurement. [`reset`](PositionEkf::reset)
/// returns it to the uninitialized state.
#[derive(Clone, Debug)]
pub struct PositionEkf {
    config: EkfConfig,
    /// State vector [lat, lon, vlat, vlon] in deg and deg/s
    x: Vector4<f64>,
    /// State covariance
    p: Matrix4<f64>,
    /// Timestamp of the last committed update
    last_t: f64,
    initialized: bool,
    /// Mahalanobis distance of the last gated measurement
    last_gate: f64,
}

impl PositionEkf {
    pub fn new(config: EkfConfig) -> Self {
        PositionEkf {
            config,
            x: Vector4::zeros(),
            p: Matrix4::zeros(),
            last_t: 0.0,
            initialized: false,
            last_gate: 0.0,
        }
    }

    /// Return the filter to the uninitialized state.
    pub fn reset(&mut self) {
        self.x = Vector4::zeros();
        self.p = Matrix4::zeros();
        self.last_t = 0.0;
        self.initialized = false;
        self.last_gate = 0.0;
    }

    pub fn config(&self) -> &EkfConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Mahalanobis distance of the most recent gated measurement
    pub fn last_gate(&self) -> f64 {
        self.last_gate
    }

    /// Timestamp of the last committed update
    pub fn last_t(&self) -> f64 {
        self.last_t
    }

    /// Current position estimate; `(0, 0)` while uninitialized.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.x[0], self.x[1])
    }

    /// Velocity estimate in degrees/second (lat rate, lon rate).
    pub fn velocity_deg_s(&self) -> (f64, f64) {
        (self.x[2], self.x[3])
    }

    /// Velocity estimate converted to meters/second (north, east).
    pub fn velocity_mps(&self) -> Velocity {
        Velocity {
            vn: self.x[2] * METERS_PER_DEGREE,
            ve: self.x[3] * METERS_PER_DEGREE * self.x[0].to_radians().cos(),
        }
    }

    /// Ground speed estimate in m/s; zero while uninitialized.
    pub fn speed_mps(&self) -> f64 {
        if !self.initialized {
            return 0.0;
        }
        self.velocity_mps().speed()
    }

    /// Process a position measurement at time `t` with uncertainty `hdop`.
    ///
    /// Returns `true` when the measurement was incorporated into the state
    /// (including the initializing measurement), `false` when it was
    /// rejected: out-of-order (`dt < 0`, state untouched), gated out as an
    /// outlier (predicted state committed, no correction), or numerically
    /// degenerate innovation covariance (predicted state committed).
    ///
    /// A gap larger than `max_gap_s` resets the filter and re-initializes
    /// it from this measurement.
    pub fn update(&mut self, measurement: GeoPoint, hdop: f64, t: f64) -> bool {
        if !self.initialized {
            self.x = Vector4::new(measurement.lat, measurement.lon, 0.0, 0.0);
            self.p = Matrix4::identity() * INIT_VARIANCE;
            self.last_t = t;
            self.initialized = true;
            self.last_gate = 0.0;
            return true;
        }

        let dt = t - self.last_t;
        if dt < 0.0 {
            return false;
        }
        if dt > self.config.max_gap_s {
            self.reset();
            return self.update(measurement, hdop, t);
        }

        // Predict
        let mut f = Matrix4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        let x_pred = f * self.x;
        let p_pred = f * self.p * f.transpose() + process_noise(self.config.process_noise, dt);

        // Innovation; H selects the two position states
        let y = Vector2::new(measurement.lat - x_pred[0], measurement.lon - x_pred[1]);
        let r = self.config.measurement_noise * hdop * hdop;
        let s = Matrix2::new(
            p_pred[(0, 0)] + r,
            p_pred[(0, 1)],
            p_pred[(1, 0)],
            p_pred[(1, 1)] + r,
        );

        let det = s.determinant();
        if det.abs() < 1e-30 {
            // Degenerate innovation covariance: no correction possible,
            // but time still advances with the prediction
            self.x = x_pred;
            self.p = p_pred;
            self.last_t = t;
            return false;
        }
        let s_inv = Matrix2::new(s[(1, 1)], -s[(0, 1)], -s[(1, 0)], s[(0, 0)]) / det;

        self.last_gate = (y.transpose() * s_inv * y)[(0, 0)].abs().sqrt();
        if self.last_gate > self.config.gate_threshold {
            // Outlier: reject the correction but commit the prediction
            self.x = x_pred;
            self.p = p_pred;
            self.last_t = t;
            return false;
        }

        // Kalman gain K = P_pred Hᵀ S⁻¹ (4×2); P_pred Hᵀ is the first two
        // columns of P_pred
        let pht: Matrix4x2<f64> = p_pred.fixed_view::<4, 2>(0, 0).into_owned();
        let k = pht * s_inv;

        self.x = x_pred + k * y;

        let mut kh = Matrix4::zeros();
        kh.fixed_view_mut::<4, 2>(0, 0).copy_from(&k);
        let p = (Matrix4::identity() - kh) * p_pred;
        // Re-symmetrize to stop round-off from accumulating asymmetry
        self.p = (p + p.transpose()) * 0.5;

        self.last_t = t;
        true
    }

    /// Extrapolate the position to time `t` along the current velocity.
    ///
    /// Returns `None` while uninitialized. The covariance is not advanced;
    /// this is a read-only projection for output between measurements.
    pub fn predict(&self, t: f64) -> Option<GeoPoint> {
        if !self.initialized {
            return None;
        }
        let dt = t - self.last_t;
        Some(GeoPoint::new(
            self.x[0] + self.x[2] * dt,
            self.x[1] + self.x[3] * dt,
        ))
    }
}

/// Standard constant-velocity kinematic process noise, block-diagonal over
/// the (lat, vlat) and (lon, vlon) pairs.
fn process_noise(q: f64, dt: f64) -> Matrix4<f64> {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt / 2.0;
    let dt4 = dt2 * dt2 / 4.0;

    let mut m = Matrix4::zeros();
    m[(0, 0)] = q * dt4;
    m[(1, 1)] = q * dt4;
    m[(2, 2)] = q * dt2;
    m[(3, 3)] = q * dt2;
    m[(0, 2)] = q * dt3;
    m[(2, 0)] = q * dt3;
    m[(1, 3)] = q * dt3;
    m[(3, 1)] = q * dt3;
    m
}
