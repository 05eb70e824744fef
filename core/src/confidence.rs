//! Position confidence estimation
//!
//! Folds the matcher's raw quality signals (RANSAC inlier ratio, match
//! count, HDOP, the filter's innovation distance, image blur, altitude
//! consistency) into a single confidence score in [0, 1] plus a
//! reliability verdict. The host uses the verdict to decide whether a
//! frame's fix is worth outputting at all; the per-component breakdown and
//! the human-readable reason go to telemetry.
//!
//! Each signal is squashed through a logistic curve tuned so that typical
//! good flights score near 1 and marginal conditions fall off steeply,
//! then the components are combined with fixed weights. Any signal below
//! its hard floor marks the frame unreliable regardless of the weighted
//! score.

use serde::{Deserialize, Serialize};

/// Raw quality signals for one matched frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Fraction of RANSAC inliers among feature matches
    pub inlier_ratio: f64,
    /// Number of feature matches
    pub match_count: u32,
    /// Horizontal dilution of precision of the fix
    pub hdop: f64,
    /// Mahalanobis distance the filter recorded for this measurement;
    /// zero or negative means "no filter data, don't penalize"
    pub ekf_innovation: f64,
    /// Laplacian variance of the frame; higher is sharper
    pub blur_score: f64,
    /// Ground speed in m/s
    pub speed_mps: f64,
    /// 1.0 = altitude estimate consistent with expectations, 0.0 = not
    pub altitude_consistency: f64,
}

impl Default for QualitySignals {
    fn default() -> Self {
        QualitySignals {
            inlier_ratio: 0.0,
            match_count: 0,
            hdop: 99.0,
            ekf_innovation: 0.0,
            blur_score: 100.0,
            speed_mps: 0.0,
            altitude_consistency: 1.0,
        }
    }
}

/// Score of each signal after normalization, all in [0, 1].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub inlier_ratio: f64,
    pub match_count: f64,
    pub hdop: f64,
    pub ekf_innovation: f64,
    pub blur: f64,
    pub altitude: f64,
}

/// Outcome of a confidence evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Weighted overall confidence in [0, 1]
    pub score: f64,
    /// True when the score clears the threshold and no hard floor tripped
    pub reliable: bool,
    pub components: ComponentScores,
    /// Semicolon-joined failure reasons, or "OK"
    pub reason: String,
}

/// Combines quality signals into a confidence verdict.
#[derive(Clone, Copy, Debug)]
pub struct ConfidenceEstimator {
    threshold: f64,
    min_matches: u32,
    min_inlier_ratio: f64,
    max_hdop: f64,
    max_ekf_gate: f64,
    min_blur: f64,
}

// Component weights; must sum to 1
const W_INLIER: f64 = 0.30;
const W_MATCHES: f64 = 0.20;
const W_HDOP: f64 = 0.15;
const W_EKF: f64 = 0.15;
const W_BLUR: f64 = 0.10;
const W_ALTITUDE: f64 = 0.10;

impl Default for ConfidenceEstimator {
    fn default() -> Self {
        ConfidenceEstimator {
            threshold: 0.5,
            min_matches: 10,
            min_inlier_ratio: 0.2,
            max_hdop: 5.0,
            max_ekf_gate: 10.0,
            min_blur: 50.0,
        }
    }
}

impl ConfidenceEstimator {
    pub fn new(threshold: f64) -> Self {
        ConfidenceEstimator {
            threshold,
            ..ConfidenceEstimator::default()
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate one frame's signals.
    pub fn evaluate(&self, signals: &QualitySignals) -> ConfidenceResult {
        let mut reasons: Vec<String> = Vec::new();

        // Inlier ratio: 0.35 is the knee; 0.6 scores near 1
        let inlier_score = sigmoid(signals.inlier_ratio, 0.35, 8.0);
        if signals.inlier_ratio < self.min_inlier_ratio {
            reasons.push(format!("low inlier ratio ({:.2})", signals.inlier_ratio));
        }

        // Match count: ~20 matches is the knee
        let match_score = sigmoid(signals.match_count as f64, 20.0, 0.15);
        if signals.match_count < self.min_matches {
            reasons.push(format!("few matches ({})", signals.match_count));
        }

        // HDOP: inverted, 3.0 scores 0.5
        let hdop_score = 1.0 - sigmoid(signals.hdop, 3.0, 1.5);
        if signals.hdop > self.max_hdop {
            reasons.push(format!("high HDOP ({:.1})", signals.hdop));
        }

        // Filter innovation: inverted, 5.0 scores 0.5; absent data scores 1
        let ekf_score = if signals.ekf_innovation > 0.0 {
            1.0 - sigmoid(signals.ekf_innovation, 5.0, 0.5)
        } else {
            1.0
        };
        if signals.ekf_innovation > self.max_ekf_gate {
            reasons.push(format!("high EKF innovation ({:.1})", signals.ekf_innovation));
        }

        // Blur: sharper frames score higher
        let blur_score = sigmoid(signals.blur_score, self.min_blur, 0.05);
        if signals.blur_score < self.min_blur {
            reasons.push(format!("blurry image ({:.0})", signals.blur_score));
        }

        let components = ComponentScores {
            inlier_ratio: inlier_score,
            match_count: match_score,
            hdop: hdop_score,
            ekf_innovation: ekf_score,
            blur: blur_score,
            altitude: signals.altitude_consistency,
        };

        let score = (components.inlier_ratio * W_INLIER
            + components.match_count * W_MATCHES
            + components.hdop * W_HDOP
            + components.ekf_innovation * W_EKF
            + components.blur * W_BLUR
            + components.altitude * W_ALTITUDE)
            .clamp(0.0, 1.0);

        let reliable = score >= self.threshold && reasons.is_empty();
        let reason = if reasons.is_empty() {
            "OK".to_string()
        } else {
            reasons.join("; ")
        };

        ConfidenceResult {
            score,
            reliable,
            components,
            reason,
        }
    }
}

/// Logistic sigmoid centered on `center`, output in [0, 1].
fn sigmoid(x: f64, center: f64, steepness: f64) -> f64 {
    let z = (steepness * (x - center)).clamp(-500.0, 500.0);
    1.0 / (1.0 + (-z).exp())
}
