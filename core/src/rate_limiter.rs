//! Output rate limiting
//!
//! Token-bucket throttle for the NMEA/MSP output path. The camera loop can
//! run faster than the flight controller's UART should be fed; the limiter
//! caps sustained output at `max_hz` while allowing a small burst after a
//! quiet period. Timestamps are supplied by the caller; the limiter never
//! reads a clock, so it composes with the same monotonic timebase the rest
//! of the core uses.

use serde::{Deserialize, Serialize};

/// Counters exposed for telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub accepted: u64,
    pub throttled: u64,
    /// Measured output rate over the recent accepts, Hz
    pub actual_hz: f64,
}

/// Token-bucket rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_hz: f64,
    burst: u32,
    tokens: f64,
    last_t: f64,
    stats: RateLimiterStats,
    accept_times: Vec<f64>,
}

impl RateLimiter {
    /// `max_hz` is the sustained output ceiling; `burst` tokens may be
    /// spent back-to-back after an idle stretch.
    pub fn new(max_hz: f64, burst: u32) -> Self {
        RateLimiter {
            max_hz,
            burst,
            tokens: burst as f64,
            last_t: 0.0,
            stats: RateLimiterStats::default(),
            accept_times: Vec::new(),
        }
    }

    pub fn max_hz(&self) -> f64 {
        self.max_hz
    }

    pub fn stats(&self) -> RateLimiterStats {
        self.stats
    }

    /// Should an output be sent at time `t`? Consumes a token on success.
    pub fn allow(&mut self, t: f64) -> bool {
        self.stats.total_requests += 1;

        if self.last_t > 0.0 {
            let elapsed = t - self.last_t;
            self.tokens = (self.tokens + elapsed * self.max_hz).min(self.burst as f64);
        }
        self.last_t = t;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.stats.accepted += 1;

            self.accept_times.push(t);
            if self.accept_times.len() > 20 {
                self.accept_times.drain(..self.accept_times.len() - 10);
            }
            if self.accept_times.len() >= 2 {
                let span = self.accept_times[self.accept_times.len() - 1] - self.accept_times[0];
                if span > 0.0 {
                    self.stats.actual_hz = (self.accept_times.len() - 1) as f64 / span;
                }
            }
            return true;
        }

        self.stats.throttled += 1;
        false
    }

    /// Seconds until the next output would be allowed, given no further
    /// calls; zero when a token is already available.
    pub fn time_until_next(&self) -> f64 {
        if self.tokens >= 1.0 {
            return 0.0;
        }
        if self.max_hz > 0.0 {
            (1.0 - self.tokens) / self.max_hz
        } else {
            0.0
        }
    }

    /// Refill the bucket and zero the statistics.
    pub fn reset(&mut self) {
        self.tokens = self.burst as f64;
        self.last_t = 0.0;
        self.stats = RateLimiterStats::default();
        self.accept_times.clear();
    }
}
