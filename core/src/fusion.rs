//! Position fusion: the source-selection state machine
//!
//! One [`Fusion::update`] call per camera frame composes the filter, dead
//! reckoning, and geofence into a single answer for the output encoders.
//! Source priority per tick:
//!
//! 1. A visual fix is present → feed the filter, output its (smoothed)
//!    position.
//! 2. No fix but the filter is alive → output its constant-velocity
//!    prediction at degraded confidence.
//! 3. Filter has nothing → dead-reckon from the last good snapshot until
//!    the extrapolation horizon runs out.
//! 4. Nothing at all → report no position; the host emits a no-fix frame.
//!
//! A configured geofence vetoes the result afterwards: the output is
//! invalidated but `geofence_ok` stays observable so the host can see why.

use crate::dead_reckoning::DeadReckoning;
use crate::geofence::Geofence;
use crate::kalman::{EkfConfig, PositionEkf};
use crate::GeoPoint;
use log::warn;
use serde::{Deserialize, Serialize};

/// Which estimator produced the output position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSource {
    #[default]
    None,
    Visual,
    EkfPredict,
    DeadReckoning,
}

/// Fix quality as reported in the NMEA quality field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    #[default]
    None,
    Visual,
    Ekf,
    Dr,
}

impl FixQuality {
    /// Integer value for the GGA fix-quality field.
    pub fn as_u8(self) -> u8 {
        match self {
            FixQuality::None => 0,
            FixQuality::Visual => 1,
            FixQuality::Ekf => 2,
            FixQuality::Dr => 3,
        }
    }
}

/// Result of one fusion tick.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FusionOutput {
    /// Fused position; meaningful only when `has_position`
    pub position: GeoPoint,
    /// Uncertainty of the output position
    pub hdop: f64,
    /// Ground speed estimate in m/s
    pub speed_mps: f64,
    /// Heading in degrees [0, 360), 0 = north; 0.0 below the speed floor
    pub heading_deg: f64,
    pub fix_quality: FixQuality,
    pub source: FixSource,
    /// False when a configured fence rejected the position
    pub geofence_ok: bool,
    /// Whether the filter incorporated this tick's measurement
    pub ekf_accepted: bool,
    pub has_position: bool,
}

impl Default for FusionOutput {
    fn default() -> Self {
        FusionOutput {
            position: GeoPoint::default(),
            hdop: 99.0,
            speed_mps: 0.0,
            heading_deg: 0.0,
            fix_quality: FixQuality::None,
            source: FixSource::None,
            geofence_ok: true,
            ekf_accepted: false,
            has_position: false,
        }
    }
}

/// HDOP reported for filter predictions (no fresh measurement)
const PREDICT_HDOP: f64 = 3.0;
/// Ground speed below which heading is reported as 0.0
const HEADING_SPEED_FLOOR_MPS: f64 = 0.5;
/// Default HDOP growth per second of dead reckoning
const DEFAULT_HDOP_GROWTH: f64 = 2.0;

/// The positioning engine: owns the filter and dead-reckoning state, holds
/// an optional fence, and turns per-frame matcher output into
/// [`FusionOutput`]s.
#[derive(Clone, Debug)]
pub struct Fusion {
    ekf: PositionEkf,
    dr: DeadReckoning,
    fence: Option<Geofence>,
}

impl Fusion {
    /// `max_dead_reckoning_s` bounds extrapolation after the filter goes
    /// stale; the fence, if any, is immutable for the life of the engine.
    pub fn new(ekf_config: EkfConfig, max_dead_reckoning_s: f64, fence: Option<Geofence>) -> Self {
        Fusion {
            ekf: PositionEkf::new(ekf_config),
            dr: DeadReckoning::new(max_dead_reckoning_s, DEFAULT_HDOP_GROWTH),
            fence,
        }
    }

    pub fn ekf(&self) -> &PositionEkf {
        &self.ekf
    }

    pub fn dead_reckoning(&self) -> &DeadReckoning {
        &self.dr
    }

    pub fn fence(&self) -> Option<&Geofence> {
        self.fence.as_ref()
    }

    /// Process one frame.
    ///
    /// `visual` is the matcher's position fix for this frame, if any;
    /// `hdop` its uncertainty; `t` the shared monotonic timestamp in
    /// seconds. Must be called with non-decreasing `t`.
    pub fn update(&mut self, visual: Option<GeoPoint>, hdop: f64, t: f64) -> FusionOutput {
        let mut out = FusionOutput::default();

        if let Some(fix) = visual {
            out.ekf_accepted = self.ekf.update(fix, hdop, t);
            if self.ekf.is_initialized() {
                out.position = self.ekf.position();
                out.hdop = hdop;
                out.source = FixSource::Visual;
                out.fix_quality = FixQuality::Visual;
                out.has_position = true;

                let vel = self.ekf.velocity_mps();
                self.dr.update_reference(out.position, vel.vn, vel.ve, hdop, t);
            }
        } else if self.ekf.is_initialized() {
            if let Some(pred) = self.ekf.predict(t) {
                out.position = pred;
                out.hdop = PREDICT_HDOP;
                out.source = FixSource::EkfPredict;
                out.fix_quality = FixQuality::Ekf;
                out.has_position = true;
            }
        }

        if !out.has_position {
            if let Some((pos, dr_hdop)) = self.dr.extrapolate(t) {
                out.position = pos;
                out.hdop = dr_hdop;
                out.source = FixSource::DeadReckoning;
                out.fix_quality = FixQuality::Dr;
                out.has_position = true;
            }
        }

        if out.has_position {
            if let Some(fence) = &self.fence {
                out.geofence_ok = fence.contains(out.position);
                if !out.geofence_ok {
                    warn!(
                        "geofence violation at {} (source {:?}), suppressing output",
                        out.position, out.source
                    );
                    out.has_position = false;
                    out.fix_quality = FixQuality::None;
                    out.source = FixSource::None;
                }
            }
        }

        if self.ekf.is_initialized() {
            out.speed_mps = self.ekf.speed_mps();
            if out.speed_mps > HEADING_SPEED_FLOOR_MPS {
                let vel = self.ekf.velocity_mps();
                let heading = vel.ve.atan2(vel.vn).to_degrees();
                out.heading_deg = (heading + 360.0) % 360.0;
            }
        }

        out
    }

    /// Clear the filter and dead-reckoning state; the fence and the
    /// dead-reckoning parameters survive.
    pub fn reset(&mut self) {
        self.ekf.reset();
        self.dr.clear();
    }
}
