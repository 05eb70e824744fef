//! System health monitoring
//!
//! Rolling-window statistics over the positioning loop: fix rate, frame
//! latency, consecutive misses, filter rejections, and geofence
//! violations. The monitor never influences the position solution; it
//! exists so a headless vehicle can notice and report its own degradation.
//!
//! Timestamps and latencies are supplied by the host; the monitor holds no
//! clock of its own.

use log::{log, Level};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Snapshot of system health.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Fix rate over the rolling window, [0, 1]
    pub fix_rate: f64,
    /// Mean frame processing latency in the window, ms
    pub avg_latency_ms: f64,
    /// Worst frame latency in the window, ms
    pub max_latency_ms: f64,
    pub frames_total: u64,
    pub fixes_total: u64,
    pub misses_total: u64,
    /// Measurements the filter gated out
    pub outliers_rejected: u64,
    pub geofence_violations: u64,
    pub healthy: bool,
    pub warnings: Vec<String>,
}

/// Rolling-window health monitor.
///
/// Warnings trigger when the fix rate drops below its floor, latency
/// exceeds its ceiling, or too many consecutive frames miss; geofence
/// violations are always reported once seen.
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    min_fix_rate: f64,
    max_latency_ms: f64,
    max_consecutive_misses: u32,

    fixes: VecDeque<bool>,
    latencies: VecDeque<f64>,
    window: usize,
    consecutive_misses: u32,
    total_frames: u64,
    total_fixes: u64,
    total_misses: u64,
    outliers_rejected: u64,
    geofence_violations: u64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        HealthMonitor::new(100, 0.3, 500.0, 30)
    }
}

impl HealthMonitor {
    pub fn new(
        window: usize,
        min_fix_rate: f64,
        max_latency_ms: f64,
        max_consecutive_misses: u32,
    ) -> Self {
        HealthMonitor {
            min_fix_rate,
            max_latency_ms,
            max_consecutive_misses,
            fixes: VecDeque::with_capacity(window),
            latencies: VecDeque::with_capacity(window),
            window,
            consecutive_misses: 0,
            total_frames: 0,
            total_fixes: 0,
            total_misses: 0,
            outliers_rejected: 0,
            geofence_violations: 0,
        }
    }

    /// Record the outcome of one processed frame.
    pub fn record_frame(&mut self, fix: bool, latency_ms: f64, ekf_accepted: bool, geofence_ok: bool) {
        self.total_frames += 1;

        if self.fixes.len() == self.window {
            self.fixes.pop_front();
        }
        self.fixes.push_back(fix);
        if self.latencies.len() == self.window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);

        if fix {
            self.total_fixes += 1;
            self.consecutive_misses = 0;
        } else {
            self.total_misses += 1;
            self.consecutive_misses += 1;
        }

        if !ekf_accepted {
            self.outliers_rejected += 1;
        }
        if !geofence_ok {
            self.geofence_violations += 1;
        }
    }

    /// Current health snapshot.
    pub fn status(&self) -> HealthStatus {
        let mut warnings = Vec::new();
        let mut healthy = true;

        let fix_rate = if self.fixes.is_empty() {
            0.0
        } else {
            self.fixes.iter().filter(|&&f| f).count() as f64 / self.fixes.len() as f64
        };
        if self.total_frames > 10 && fix_rate < self.min_fix_rate {
            warnings.push(format!(
                "Low fix rate: {:.0}% (min {:.0}%)",
                fix_rate * 100.0,
                self.min_fix_rate * 100.0
            ));
            healthy = false;
        }

        let (avg_latency_ms, max_latency_ms) = if self.latencies.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = self.latencies.iter().sum();
            let max = self.latencies.iter().cloned().fold(0.0, f64::max);
            (sum / self.latencies.len() as f64, max)
        };
        if avg_latency_ms > self.max_latency_ms {
            warnings.push(format!(
                "High latency: {:.0}ms avg (max {:.0}ms)",
                avg_latency_ms, self.max_latency_ms
            ));
            healthy = false;
        }

        if self.consecutive_misses >= self.max_consecutive_misses {
            warnings.push(format!(
                "Lost fix: {} consecutive misses",
                self.consecutive_misses
            ));
            healthy = false;
        }

        if self.geofence_violations > 0 {
            warnings.push(format!("Geofence violations: {}", self.geofence_violations));
        }

        HealthStatus {
            fix_rate,
            avg_latency_ms,
            max_latency_ms,
            frames_total: self.total_frames,
            fixes_total: self.total_fixes,
            misses_total: self.total_misses,
            outliers_rejected: self.outliers_rejected,
            geofence_violations: self.geofence_violations,
            healthy,
            warnings,
        }
    }

    /// Emit the current status through the `log` facade, at warn level
    /// when degraded.
    pub fn log_status(&self) {
        let s = self.status();
        let level = if s.healthy { Level::Info } else { Level::Warn };
        log!(
            level,
            "Health: fix={:.0}% lat={:.0}ms frames={} fixes={} misses={} outliers={}{}",
            s.fix_rate * 100.0,
            s.avg_latency_ms,
            s.frames_total,
            s.fixes_total,
            s.misses_total,
            s.outliers_rejected,
            if s.warnings.is_empty() {
                String::new()
            } else {
                format!(" WARNINGS: {}", s.warnings.join("; "))
            }
        );
    }
}
