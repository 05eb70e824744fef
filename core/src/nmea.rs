//! NMEA 0183 sentence generation
//!
//! Builds the two sentence types a flight controller's GPS parser needs:
//! `$GPGGA` (fix data) and `$GPRMC` (recommended minimum). Sentences are
//! ASCII, checksummed with the standard XOR over the body, and terminated
//! with CRLF.
//!
//! The encoders write into caller-supplied buffers (at least
//! [`MIN_BUFFER_LEN`] bytes) and never allocate. Timestamps come in as a
//! [`UtcTime`] value rather than being read inside the encoder, so output
//! is reproducible and tests can pin the clock; [`UtcTime::now`] is the
//! one place the crate touches the wall clock.

use crate::{EncodeError, GeoPoint};
use chrono::{Datelike, Timelike, Utc};
use std::fmt::{self, Write};

/// Minimum output buffer length accepted by the sentence encoders
pub const MIN_BUFFER_LEN: usize = 128;

/// Conversion factor from meters/second to knots
pub const MPS_TO_KNOTS: f64 = 1.943_844_49;

/// A broken-down UTC timestamp for sentence formatting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtcTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    pub month: u8,
    /// Full year, e.g. 2024
    pub year: u16,
}

impl UtcTime {
    /// Snapshot the current wall-clock UTC time.
    pub fn now() -> Self {
        let now = Utc::now();
        UtcTime {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            day: now.day() as u8,
            month: now.month() as u8,
            year: now.year() as u16,
        }
    }
}

/// XOR checksum over a sentence body: every character between a leading `$`
/// (skipped if present) and the terminating `*` (or end of string).
pub fn checksum(sentence: &str) -> u8 {
    let mut cs = 0u8;
    for &b in sentence.as_bytes().iter().skip(usize::from(sentence.starts_with('$'))) {
        if b == b'*' {
            break;
        }
        cs ^= b;
    }
    cs
}

/// `fmt::Write` adapter over a byte slice that fails instead of growing.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> SliceWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        SliceWriter { buf, len: 0 }
    }

    fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if self.len + bytes.len() > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

/// Split a signed degree value into whole degrees, decimal minutes, and the
/// hemisphere letter (`ddmm.mmmmm` convention).
fn deg_to_dm(deg: f64, is_lon: bool) -> (u32, f64, char) {
    let abs = deg.abs();
    let d = abs as u32;
    let m = (abs - d as f64) * 60.0;
    let dir = match (is_lon, deg >= 0.0) {
        (false, true) => 'N',
        (false, false) => 'S',
        (true, true) => 'E',
        (true, false) => 'W',
    };
    (d, m, dir)
}

/// Frame a finished body into `out`: `$` + body + `*` + uppercase hex
/// checksum + CRLF. Returns the number of bytes written.
fn frame(out: &mut [u8], body: &[u8]) -> Result<usize, EncodeError> {
    let needed = body.len() + 6; // '$', '*', 2 hex digits, CR, LF
    if out.len() < needed {
        return Err(EncodeError::BufferTooSmall {
            available: out.len(),
        });
    }

    let mut cs = 0u8;
    for &b in body {
        cs ^= b;
    }

    out[0] = b'$';
    out[1..1 + body.len()].copy_from_slice(body);
    let tail = &mut out[1 + body.len()..];
    tail[0] = b'*';
    tail[1] = HEX[(cs >> 4) as usize];
    tail[2] = HEX[(cs & 0x0F) as usize];
    tail[3] = b'\r';
    tail[4] = b'\n';
    Ok(needed)
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encode a `$GPGGA` fix-data sentence into `out`.
///
/// `fix_quality` is the integer GGA quality indicator (0 = no fix,
/// 1 = visual, 2 = filter prediction, 3 = dead reckoning in this system);
/// the satellite count field is fixed at 08. Returns bytes written.
pub fn format_gga(
    out: &mut [u8],
    pos: GeoPoint,
    fix_quality: u8,
    hdop: f64,
    altitude_m: f64,
    utc: &UtcTime,
) -> Result<usize, EncodeError> {
    let (lat_d, lat_m, lat_dir) = deg_to_dm(pos.lat, false);
    let (lon_d, lon_m, lon_dir) = deg_to_dm(pos.lon, true);

    let mut body_buf = [0u8; MIN_BUFFER_LEN];
    let mut body = SliceWriter::new(&mut body_buf);
    write!(
        body,
        "GPGGA,{:02}{:02}{:02}.00,{:02}{:08.5},{},{:03}{:08.5},{},{},08,{:.1},{:.1},M,0.0,M,,",
        utc.hour,
        utc.minute,
        utc.second,
        lat_d,
        lat_m,
        lat_dir,
        lon_d,
        lon_m,
        lon_dir,
        fix_quality,
        hdop,
        altitude_m,
    )
    .map_err(|_| EncodeError::BufferTooSmall {
        available: out.len(),
    })?;

    frame(out, body.written())
}

/// Encode a `$GPRMC` recommended-minimum sentence into `out`.
///
/// `active` selects the A/V status flag; speed is in knots and heading in
/// degrees. Returns bytes written.
pub fn format_rmc(
    out: &mut [u8],
    pos: GeoPoint,
    active: bool,
    speed_knots: f64,
    heading_deg: f64,
    utc: &UtcTime,
) -> Result<usize, EncodeError> {
    let (lat_d, lat_m, lat_dir) = deg_to_dm(pos.lat, false);
    let (lon_d, lon_m, lon_dir) = deg_to_dm(pos.lon, true);

    let mut body_buf = [0u8; MIN_BUFFER_LEN];
    let mut body = SliceWriter::new(&mut body_buf);
    write!(
        body,
        "GPRMC,{:02}{:02}{:02}.00,{},{:02}{:08.5},{},{:03}{:08.5},{},{:.1},{:.1},{:02}{:02}{:02},,,A",
        utc.hour,
        utc.minute,
        utc.second,
        if active { 'A' } else { 'V' },
        lat_d,
        lat_m,
        lat_dir,
        lon_d,
        lon_m,
        lon_dir,
        speed_knots,
        heading_deg,
        utc.day,
        utc.month,
        utc.year % 100,
    )
    .map_err(|_| EncodeError::BufferTooSmall {
        available: out.len(),
    })?;

    frame(out, body.written())
}
