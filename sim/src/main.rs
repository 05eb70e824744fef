//! Synthetic flight simulator for the VPS positioning core.
//!
//! Generates a circular flight over a configurable center point, corrupts
//! the "visual fixes" with seeded Gaussian noise, a fix dropout window, and
//! periodic gross outliers, then runs the fusion engine tick by tick the
//! way the onboard main loop would. The per-tick trace (truth, measurement,
//! fused output, error) is written to CSV for offline analysis, and sample
//! NMEA/MSP output is emitted through the rate limiter to mimic the UART
//! path.

mod common;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::path::PathBuf;

use vps::earth::haversine_km;
use vps::fusion::Fusion;
use vps::geofence::Geofence;
use vps::health::HealthMonitor;
use vps::kalman::EkfConfig;
use vps::msp::{MspGps, MSP_GPS_FRAME_LEN};
use vps::nmea::{self, UtcTime, MIN_BUFFER_LEN, MPS_TO_KNOTS};
use vps::rate_limiter::RateLimiter;
use vps::{GeoPoint, METERS_PER_DEGREE};

/// Command line arguments
#[derive(Parser)]
#[command(
    author,
    version,
    about = "Synthetic flight simulation for the VPS positioning core"
)]
struct Cli {
    /// Flight duration in seconds
    #[arg(long, default_value_t = 120.0)]
    duration_s: f64,

    /// Fusion tick rate in Hz
    #[arg(long, default_value_t = 3.0)]
    rate_hz: f64,

    /// Ground speed of the simulated vehicle in m/s
    #[arg(long, default_value_t = 10.0)]
    speed_mps: f64,

    /// Orbit radius in meters
    #[arg(long, default_value_t = 300.0)]
    orbit_radius_m: f64,

    /// Center latitude in degrees
    #[arg(long, default_value_t = 52.52)]
    lat: f64,

    /// Center longitude in degrees
    #[arg(long, default_value_t = 13.405)]
    lon: f64,

    /// Measurement noise, 1-sigma, in meters
    #[arg(long, default_value_t = 2.0)]
    noise_m: f64,

    /// Start of the fix dropout window in seconds (no dropout if omitted)
    #[arg(long)]
    dropout_start_s: Option<f64>,

    /// Length of the fix dropout window in seconds
    #[arg(long, default_value_t = 5.0)]
    dropout_len_s: f64,

    /// Inject a ~500 m outlier every N frames (0 disables)
    #[arg(long, default_value_t = 0)]
    outlier_every: u32,

    /// Geofence radius around the center in kilometers (0 disables)
    #[arg(long, default_value_t = 5.0)]
    fence_radius_km: f64,

    /// RNG seed for reproducible noise
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV path for the per-tick trace
    #[arg(long, default_value = "flight_trace.csv")]
    output: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// One row of the output trace.
#[derive(Debug, Serialize)]
struct TraceRecord {
    t: f64,
    true_lat: f64,
    true_lon: f64,
    meas_lat: Option<f64>,
    meas_lon: Option<f64>,
    fused_lat: f64,
    fused_lon: f64,
    has_position: bool,
    source: String,
    hdop: f64,
    speed_mps: f64,
    heading_deg: f64,
    error_m: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    common::init_logger(&cli.log_level, cli.log_file.as_ref())
        .map_err(|e| anyhow::anyhow!("logger setup failed: {e}"))?;

    let center = GeoPoint::new(cli.lat, cli.lon);
    let fence = (cli.fence_radius_km > 0.0)
        .then(|| Geofence::circle(center, cli.fence_radius_km, 0.05));
    let mut fusion = Fusion::new(EkfConfig::default(), 10.0, fence);
    let mut health = HealthMonitor::default();
    let mut limiter = RateLimiter::new(5.0, 2);

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let noise = Normal::new(0.0, cli.noise_m / METERS_PER_DEGREE)
        .context("building noise distribution")?;

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;

    info!(
        "simulating {:.0}s orbit at {:.1} m/s around {} ({} Hz, seed {})",
        cli.duration_s, cli.speed_mps, center, cli.rate_hz, cli.seed
    );

    let dt = 1.0 / cli.rate_hz;
    let angular_rate = cli.speed_mps / cli.orbit_radius_m;
    let ticks = (cli.duration_s * cli.rate_hz) as u64;

    let mut errors_m: Vec<f64> = Vec::new();
    let mut emitted_frames = 0u64;

    for i in 0..ticks {
        let t = i as f64 * dt;
        let truth = orbit_position(center, cli.orbit_radius_m, angular_rate, t);

        let in_dropout = cli
            .dropout_start_s
            .map(|start| t >= start && t < start + cli.dropout_len_s)
            .unwrap_or(false);

        let measurement = if in_dropout {
            None
        } else {
            let mut lat = truth.lat + noise.sample(&mut rng);
            let mut lon = truth.lon + noise.sample(&mut rng) / center.lat_rad().cos();
            if cli.outlier_every > 0 && i > 0 && i % cli.outlier_every as u64 == 0 {
                // Gross outlier ~500 m north
                lat += 500.0 / METERS_PER_DEGREE;
                debug!("injecting outlier at t={t:.1}");
            }
            Some(GeoPoint::new(lat, lon))
        };

        let out = fusion.update(measurement, 1.0, t);
        health.record_frame(out.has_position, dt * 1000.0, out.ekf_accepted, out.geofence_ok);

        let error_m = if out.has_position {
            haversine_km(truth, out.position) * 1000.0
        } else {
            f64::NAN
        };
        if out.has_position {
            errors_m.push(error_m);
        }

        if out.has_position && limiter.allow(t) {
            emitted_frames += 1;
            emit_wire_frames(&out)?;
        }

        writer
            .serialize(TraceRecord {
                t,
                true_lat: truth.lat,
                true_lon: truth.lon,
                meas_lat: measurement.map(|m| m.lat),
                meas_lon: measurement.map(|m| m.lon),
                fused_lat: out.position.lat,
                fused_lon: out.position.lon,
                has_position: out.has_position,
                source: format!("{:?}", out.source),
                hdop: out.hdop,
                speed_mps: out.speed_mps,
                heading_deg: out.heading_deg,
                error_m,
            })
            .context("writing trace record")?;
    }
    writer.flush().context("flushing trace")?;

    health.log_status();
    if !errors_m.is_empty() {
        let mean = errors_m.iter().sum::<f64>() / errors_m.len() as f64;
        let max = errors_m.iter().cloned().fold(0.0, f64::max);
        info!(
            "position error: mean {:.2} m, max {:.2} m over {} fixes; {} wire frames emitted",
            mean,
            max,
            errors_m.len(),
            emitted_frames
        );
    }
    info!("trace written to {}", cli.output.display());
    Ok(())
}

/// Truth position on the circular orbit at time `t`.
fn orbit_position(center: GeoPoint, radius_m: f64, angular_rate: f64, t: f64) -> GeoPoint {
    let theta = angular_rate * t;
    let north_m = radius_m * theta.sin();
    let east_m = radius_m * theta.cos();
    GeoPoint::new(
        center.lat + north_m / METERS_PER_DEGREE,
        center.lon + east_m / (METERS_PER_DEGREE * center.lat_rad().cos()),
    )
}

/// Encode the fused output as NMEA and MSP, logging samples at debug level.
fn emit_wire_frames(out: &vps::fusion::FusionOutput) -> Result<()> {
    let utc = UtcTime::now();

    let mut gga = [0u8; MIN_BUFFER_LEN];
    let n = nmea::format_gga(
        &mut gga,
        out.position,
        out.fix_quality.as_u8(),
        out.hdop,
        0.0,
        &utc,
    )
    .map_err(|e| anyhow::anyhow!("GGA encode failed: {e}"))?;
    debug!("{}", String::from_utf8_lossy(&gga[..n]).trim_end());

    let mut rmc = [0u8; MIN_BUFFER_LEN];
    let n = nmea::format_rmc(
        &mut rmc,
        out.position,
        out.has_position,
        out.speed_mps * MPS_TO_KNOTS,
        out.heading_deg,
        &utc,
    )
    .map_err(|e| anyhow::anyhow!("RMC encode failed: {e}"))?;
    debug!("{}", String::from_utf8_lossy(&rmc[..n]).trim_end());

    let gps = MspGps::from_position(
        out.position,
        out.speed_mps,
        out.heading_deg,
        out.hdop,
        out.has_position,
    );
    let mut frame = [0u8; MSP_GPS_FRAME_LEN];
    gps.encode(&mut frame)
        .map_err(|e| anyhow::anyhow!("MSP encode failed: {e}"))?;

    Ok(())
}
