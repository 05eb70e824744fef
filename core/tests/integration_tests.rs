//! End-to-end scenarios for the positioning core
//!
//! These tests exercise the full pipeline through the public API the host
//! uses: fusion ticks in, wire bytes out. They cover the cold start, the
//! moving-vehicle case, outlier rejection, prediction across fix gaps,
//! dead reckoning after a filter wipe, the geofence veto, and bit-exact
//! NMEA/MSP output of a fused solution.

use assert_approx_eq::assert_approx_eq;
use vps::fusion::{FixQuality, FixSource, Fusion};
use vps::kalman::EkfConfig;
use vps::geofence::Geofence;
use vps::msp::{self, MspGps, MSP_GPS_FRAME_LEN};
use vps::nmea::{self, UtcTime, MIN_BUFFER_LEN, MPS_TO_KNOTS};
use vps::{GeoPoint, METERS_PER_DEGREE};

/// ~10 m/s northward, in degrees of latitude per second
const TEN_MPS_DEG: f64 = 10.0 / METERS_PER_DEGREE;

fn fusion() -> Fusion {
    Fusion::new(EkfConfig::default(), 10.0, None)
}

/// Feed `n` fixes at 1 Hz moving north at ~10 m/s from (37, -122).
fn fly_north(f: &mut Fusion, n: usize) {
    for i in 0..n {
        let t = i as f64;
        let out = f.update(Some(GeoPoint::new(37.0 + TEN_MPS_DEG * t, -122.0)), 1.0, t);
        assert!(out.ekf_accepted, "fix {i} unexpectedly rejected");
    }
}

#[test]
fn cold_start_single_fix() {
    let mut f = fusion();
    let out = f.update(Some(GeoPoint::new(37.0, -122.0)), 1.0, 0.0);

    assert!(out.has_position);
    assert!(out.ekf_accepted);
    assert_eq!(out.source, FixSource::Visual);
    assert_eq!(out.fix_quality, FixQuality::Visual);
    assert_approx_eq!(out.position.lat, 37.0, 1e-9);
    assert_approx_eq!(out.position.lon, -122.0, 1e-9);
    assert_eq!(out.speed_mps, 0.0);
    assert_eq!(out.heading_deg, 0.0);
    assert_eq!(out.hdop, 1.0);
}

#[test]
fn northward_track_yields_speed_and_heading() {
    let mut f = fusion();
    fly_north(&mut f, 3);
    let t = 3.0;
    let out = f.update(Some(GeoPoint::new(37.0 + TEN_MPS_DEG * t, -122.0)), 1.0, t);

    assert!(out.ekf_accepted);
    assert!(out.speed_mps > 9.0 && out.speed_mps < 11.0, "speed {}", out.speed_mps);
    assert!(
        out.heading_deg < 10.0 || out.heading_deg > 350.0,
        "heading {}",
        out.heading_deg
    );
}

#[test]
fn outlier_rejected_output_follows_prediction() {
    let mut f = fusion();
    fly_north(&mut f, 3);
    let expected = f.ekf().predict(3.0).unwrap();

    // 10 degrees of latitude in one second: unambiguous outlier
    let out = f.update(Some(GeoPoint::new(47.0, -122.0)), 1.0, 3.0);
    assert!(!out.ekf_accepted);
    assert_eq!(out.source, FixSource::Visual);
    assert!(out.has_position);
    // The output is the filter's committed prediction, not the outlier
    assert_approx_eq!(out.position.lat, expected.lat, 1e-12);
    assert_approx_eq!(out.position.lon, -122.0, 1e-9);
    assert!(out.position.lat < 37.001);
}

#[test]
fn prediction_bridges_fix_gap() {
    let mut f = fusion();
    fly_north(&mut f, 3);
    let last = f.ekf().position();
    let (vlat, _) = f.ekf().velocity_deg_s();

    let out = f.update(None, 1.0, 3.0);
    assert_eq!(out.source, FixSource::EkfPredict);
    assert_eq!(out.fix_quality, FixQuality::Ekf);
    assert_eq!(out.hdop, 3.0);
    assert_approx_eq!(out.position.lat, last.lat + vlat, 1e-12);
}

#[test]
fn dead_reckoning_after_filter_wipe() {
    let mut f = fusion();
    // Two fixes establish the DR anchor at t=1 with hdop 1.0
    fly_north(&mut f, 2);
    let dr = f.dead_reckoning();
    assert!(dr.has_reference());
    // The anchor outlives a filter wipe; extrapolating it 2 s past the
    // anchor grows hdop from 1.0 at 2.0/s
    let (pos, hdop) = dr.extrapolate(3.0).unwrap();
    assert_approx_eq!(hdop, 5.0, 1e-9);
    // Position continued along the anchor velocity
    assert!(pos.lat > 37.0);
    // Past the 10 s horizon the anchor is useless
    assert!(dr.extrapolate(11.5).is_none());
}

#[test]
fn geofence_veto_suppresses_output() {
    let fence = Geofence::circle(GeoPoint::new(0.0, 0.0), 1.0, 0.0);
    let mut f = Fusion::new(EkfConfig::default(), 10.0, Some(fence));

    // (1, 0) is ~111 km outside the 1 km fence
    let out = f.update(Some(GeoPoint::new(1.0, 0.0)), 1.0, 0.0);
    assert!(!out.has_position);
    assert!(!out.geofence_ok);
    assert_eq!(out.source, FixSource::None);
    assert_eq!(out.fix_quality, FixQuality::None);
}

#[test]
fn gga_bytes_from_fused_output() {
    let mut f = fusion();
    let out = f.update(Some(GeoPoint::new(37.5, -122.25)), 1.2, 0.0);
    assert!(out.has_position);

    let utc = UtcTime {
        hour: 12,
        minute: 34,
        second: 56,
        day: 1,
        month: 1,
        year: 2025,
    };
    let mut buf = [0u8; MIN_BUFFER_LEN];
    let n = nmea::format_gga(
        &mut buf,
        out.position,
        out.fix_quality.as_u8(),
        out.hdop,
        100.5,
        &utc,
    )
    .unwrap();
    let s = std::str::from_utf8(&buf[..n]).unwrap();

    assert!(
        s.starts_with("$GPGGA,123456.00,3730.00000,N,12215.00000,W,1,08,1.2,100.5,M,0.0,M,,*"),
        "{s}"
    );
    assert!(s.ends_with("\r\n"));
    // Transmitted checksum digits match a recomputation over the body
    let star = s.find('*').unwrap();
    let transmitted = u8::from_str_radix(&s[star + 1..star + 3], 16).unwrap();
    assert_eq!(nmea::checksum(s), transmitted);
}

#[test]
fn rmc_reflects_fusion_kinematics() {
    let mut f = fusion();
    fly_north(&mut f, 4);
    let out = f.update(None, 1.0, 3.5);

    let utc = UtcTime {
        hour: 6,
        minute: 7,
        second: 8,
        day: 21,
        month: 3,
        year: 2025,
    };
    let mut buf = [0u8; MIN_BUFFER_LEN];
    let n = nmea::format_rmc(
        &mut buf,
        out.position,
        out.has_position,
        out.speed_mps * MPS_TO_KNOTS,
        out.heading_deg,
        &utc,
    )
    .unwrap();
    let s = std::str::from_utf8(&buf[..n]).unwrap();

    assert!(s.starts_with("$GPRMC,060708.00,A,"), "{s}");
    assert!(s.contains(",210325,,,A*"), "{s}");
    // ~10 m/s ground speed comes out near 19.4 knots
    let speed_field: f64 = s.split(',').nth(7).unwrap().parse().unwrap();
    assert!((18.0..21.0).contains(&speed_field), "{s}");
}

#[test]
fn msp_frame_from_fused_output() {
    let mut f = fusion();
    let out = f.update(Some(GeoPoint::new(37.5, -122.25)), 1.2, 0.0);

    let gps = MspGps::from_position(
        out.position,
        5.0,
        90.0,
        out.hdop,
        out.has_position,
    );
    let mut frame = [0u8; MSP_GPS_FRAME_LEN];
    assert_eq!(gps.encode(&mut frame).unwrap(), 24);

    assert_eq!(&frame[..7], &[0x24, 0x4D, 0x3C, 0x12, 0xC9, 0x02, 0x0C]);
    assert_eq!(&frame[7..11], &375_000_000_i32.to_le_bytes());
    assert_eq!(&frame[11..15], &(-1_222_500_000_i32).to_le_bytes());
    assert_eq!(frame[23], msp::checksum(&frame[3..23]));
}

#[test]
fn no_fix_degrades_to_no_fix_frames() {
    let mut f = fusion();
    let out = f.update(None, 1.0, 0.0);
    assert!(!out.has_position);

    // The host still emits frames; they carry the no-fix markers
    let gps = MspGps::from_position(out.position, out.speed_mps, out.heading_deg, out.hdop, false);
    let mut frame = [0u8; MSP_GPS_FRAME_LEN];
    gps.encode(&mut frame).unwrap();
    assert_eq!(frame[5], 0); // fix type
    assert_eq!(frame[6], 0); // satellites

    let utc = UtcTime::default();
    let mut buf = [0u8; MIN_BUFFER_LEN];
    let n = nmea::format_rmc(&mut buf, out.position, false, 0.0, 0.0, &utc).unwrap();
    let s = std::str::from_utf8(&buf[..n]).unwrap();
    assert!(s.starts_with("$GPRMC,000000.00,V,"), "{s}");
}

#[test]
fn long_gap_resets_filter_to_new_fix() {
    let mut f = fusion();
    fly_north(&mut f, 2);
    // 31 s later (past max_gap_s) the filter re-initializes, not blends
    let paris = GeoPoint::new(48.8566, 2.3522);
    let out = f.update(Some(paris), 1.0, 32.0);
    assert!(out.ekf_accepted);
    assert_approx_eq!(out.position.lat, paris.lat, 1e-9);
    assert_approx_eq!(out.position.lon, paris.lon, 1e-9);
    assert_eq!(f.ekf().velocity_deg_s(), (0.0, 0.0));
}

#[test]
fn full_mission_profile() {
    // Fly, lose fixes, predict, recover; the source machine follows along
    let fence = Geofence::circle(GeoPoint::new(37.0, -122.0), 10.0, 0.2);
    let mut f = Fusion::new(EkfConfig::default(), 10.0, Some(fence));

    let mut sources = Vec::new();
    for i in 0..20 {
        let t = i as f64;
        // Fixes drop out for t in [8, 12)
        let visual = if (8..12).contains(&i) {
            None
        } else {
            Some(GeoPoint::new(37.0 + TEN_MPS_DEG * t, -122.0))
        };
        let out = f.update(visual, 1.0, t);
        assert!(out.has_position, "tick {i} lost position");
        assert!(out.geofence_ok);
        sources.push(out.source);
    }

    assert_eq!(sources[7], FixSource::Visual);
    assert_eq!(sources[9], FixSource::EkfPredict);
    assert_eq!(sources[12], FixSource::Visual);
}
