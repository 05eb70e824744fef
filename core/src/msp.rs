//! MSP `MSP_SET_RAW_GPS` frame generation
//!
//! The MultiWii Serial Protocol alternative to NMEA: a fixed 24-byte binary
//! frame that injects a GPS solution directly into a Cleanflight/Betaflight
//! flight controller (command 201, 18-byte little-endian payload, XOR
//! checksum over length + command + payload). Binary framing avoids the
//! parse jitter of ASCII sentences on slow UARTs.
//!
//! Frame layout:
//!
//! ```text
//! offset  size  field
//!      0     3  "$M<"
//!      3     1  payload length (18)
//!      4     1  command (201)
//!      5     1  fix type (2 with fix, 0 without)
//!      6     1  satellite count (12 with fix, 0 without)
//!      7     4  latitude  * 1e7   (i32 LE)
//!     11     4  longitude * 1e7   (i32 LE)
//!     15     2  altitude, meters  (i16 LE)
//!     17     2  speed, cm/s       (u16 LE)
//!     19     2  heading * 10, deg (u16 LE)
//!     21     2  HDOP * 100        (u16 LE)
//!     23     1  checksum
//! ```

use crate::{EncodeError, GeoPoint};
use serde::{Deserialize, Serialize};

/// MSP command id for GPS injection
pub const MSP_CMD_SET_RAW_GPS: u8 = 201;
/// Payload size of `MSP_SET_RAW_GPS`
pub const MSP_GPS_PAYLOAD: u8 = 18;
/// Total encoded frame size in bytes
pub const MSP_GPS_FRAME_LEN: usize = 24;

/// The integer field set of an `MSP_SET_RAW_GPS` payload.
///
/// Conversions from float values truncate toward zero; keeping values in
/// range is the producer's job (the fusion layer's outputs are bounded).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MspGps {
    /// 2 when a fix is held, 0 otherwise
    pub fix_type: u8,
    /// 12 when a fix is held, 0 otherwise
    pub num_sat: u8,
    /// Latitude in 1e-7 degrees
    pub lat_e7: i32,
    /// Longitude in 1e-7 degrees
    pub lon_e7: i32,
    /// Altitude in meters
    pub altitude_m: i16,
    /// Ground speed in cm/s
    pub speed_cms: u16,
    /// Heading in 0.1-degree units
    pub heading_deg10: u16,
    /// HDOP scaled by 100
    pub hdop_x100: u16,
}

impl MspGps {
    /// Build the payload from a fused position solution.
    pub fn from_position(
        pos: GeoPoint,
        speed_mps: f64,
        heading_deg: f64,
        hdop: f64,
        has_fix: bool,
    ) -> Self {
        MspGps {
            fix_type: if has_fix { 2 } else { 0 },
            num_sat: if has_fix { 12 } else { 0 },
            lat_e7: (pos.lat * 1e7) as i32,
            lon_e7: (pos.lon * 1e7) as i32,
            altitude_m: 0,
            speed_cms: (speed_mps * 100.0) as u16,
            heading_deg10: (heading_deg * 10.0) as u16,
            hdop_x100: (hdop * 100.0) as u16,
        }
    }

    /// Encode the 24-byte frame into `out`. Returns bytes written.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        if out.len() < MSP_GPS_FRAME_LEN {
            return Err(EncodeError::BufferTooSmall {
                available: out.len(),
            });
        }

        out[0] = b'$';
        out[1] = b'M';
        out[2] = b'<';
        out[3] = MSP_GPS_PAYLOAD;
        out[4] = MSP_CMD_SET_RAW_GPS;
        out[5] = self.fix_type;
        out[6] = self.num_sat;
        out[7..11].copy_from_slice(&self.lat_e7.to_le_bytes());
        out[11..15].copy_from_slice(&self.lon_e7.to_le_bytes());
        out[15..17].copy_from_slice(&self.altitude_m.to_le_bytes());
        out[17..19].copy_from_slice(&self.speed_cms.to_le_bytes());
        out[19..21].copy_from_slice(&self.heading_deg10.to_le_bytes());
        out[21..23].copy_from_slice(&self.hdop_x100.to_le_bytes());
        out[23] = checksum(&out[3..23]);

        Ok(MSP_GPS_FRAME_LEN)
    }
}

/// MSP checksum: XOR of every byte (applied over length + command +
/// payload when framing).
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |cs, b| cs ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(gps: &MspGps) -> [u8; MSP_GPS_FRAME_LEN] {
        let mut buf = [0u8; MSP_GPS_FRAME_LEN];
        assert_eq!(gps.encode(&mut buf).unwrap(), MSP_GPS_FRAME_LEN);
        buf
    }

    #[test]
    fn reference_frame_header_and_coordinates() {
        let gps = MspGps::from_position(GeoPoint::new(37.5, -122.25), 5.0, 90.0, 1.2, true);
        let frame = encode(&gps);

        assert_eq!(&frame[..7], &[0x24, 0x4D, 0x3C, 0x12, 0xC9, 0x02, 0x0C]);
        assert_eq!(&frame[7..11], &375_000_000_i32.to_le_bytes());
        assert_eq!(&frame[11..15], &(-1_222_500_000_i32).to_le_bytes());
        assert_eq!(&frame[17..19], &500_u16.to_le_bytes());
        assert_eq!(&frame[19..21], &900_u16.to_le_bytes());
        assert_eq!(&frame[21..23], &120_u16.to_le_bytes());
    }

    #[test]
    fn checksum_covers_len_cmd_and_payload() {
        let gps = MspGps::from_position(GeoPoint::new(52.52, 13.405), 12.3, 271.5, 2.4, true);
        let frame = encode(&gps);
        assert_eq!(frame[23], checksum(&frame[3..23]));
    }

    #[test]
    fn no_fix_zeroes_type_and_sats() {
        let gps = MspGps::from_position(GeoPoint::default(), 0.0, 0.0, 99.0, false);
        assert_eq!(gps.fix_type, 0);
        assert_eq!(gps.num_sat, 0);
        let frame = encode(&gps);
        assert_eq!(frame[5], 0);
        assert_eq!(frame[6], 0);
    }

    #[test]
    fn conversions_truncate_toward_zero() {
        let gps = MspGps::from_position(GeoPoint::new(1.23456789, -1.23456789), 3.999, 359.99, 1.999, true);
        assert_eq!(gps.lat_e7, 12_345_678);
        assert_eq!(gps.lon_e7, -12_345_678);
        assert_eq!(gps.speed_cms, 399);
        assert_eq!(gps.heading_deg10, 3599);
        assert_eq!(gps.hdop_x100, 199);
    }

    #[test]
    fn small_buffer_rejected() {
        let gps = MspGps::default();
        let mut buf = [0u8; 23];
        assert_eq!(
            gps.encode(&mut buf).unwrap_err(),
            EncodeError::BufferTooSmall { available: 23 }
        );
    }
}
