//! Runtime fix reader
//!
//! Waits for a navigation data frame and converts it to engineering units.

use crate::core::protocol::{receive_frame, FrameError, Message, MessageError, MessageId, NavigationData, ReceiveOptions};
use crate::core::transport::GpsSerial;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// GNSS epoch (1980-01-06) as Unix milliseconds
pub const GNSS_EPOCH_UNIX_MS: i64 = 315_964_800_000;
/// Milliseconds in a GNSS week
pub const MS_PER_WEEK: i64 = 604_800_000;
/// Receiver time-of-week tick, in milliseconds
pub const TOW_TICK_MS: i64 = 10;

/// Fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FixMode {
    /// No position
    #[default]
    #[serde(rename = "none")]
    NoFix,
    /// Horizontal position only
    #[serde(rename = "2d")]
    Fix2D,
    /// Full 3D position
    #[serde(rename = "3d")]
    Fix3D,
    /// 3D position with differential corrections
    #[serde(rename = "3d_dgps")]
    Fix3DDgps,
}

impl FixMode {
    /// Check if a position is available
    pub fn has_fix(&self) -> bool {
        !matches!(self, Self::NoFix)
    }

    /// Short machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFix => "none",
            Self::Fix2D => "2d",
            Self::Fix3D => "3d",
            Self::Fix3DDgps => "3d_dgps",
        }
    }
}

impl From<u8> for FixMode {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::Fix2D,
            2 => Self::Fix3D,
            3 => Self::Fix3DDgps,
            _ => Self::NoFix,
        }
    }
}

impl fmt::Display for FixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFix => write!(f, "no fix"),
            Self::Fix2D => write!(f, "2D"),
            Self::Fix3D => write!(f, "3D"),
            Self::Fix3DDgps => write!(f, "3D+DGNSS"),
        }
    }
}

/// One decoded position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixSample {
    /// Fix quality
    pub fix_mode: FixMode,
    /// Satellites used
    pub satellites: u8,
    /// Degrees, north positive
    pub latitude: f64,
    /// Degrees, east positive
    pub longitude: f64,
    /// Ellipsoid altitude in meters
    pub altitude: f64,
    /// Speed over ground in km/h
    pub speed_kmh: f64,
    /// Unix time in milliseconds
    pub timestamp_ms: i64,
}

impl FixSample {
    /// Convert raw navigation data
    pub fn from_navigation(nav: &NavigationData) -> Self {
        Self {
            fix_mode: FixMode::from(nav.fix_mode),
            satellites: nav.satellites,
            latitude: f64::from(nav.latitude) / 1e7,
            longitude: f64::from(nav.longitude) / 1e7,
            altitude: f64::from(nav.ellipsoid_altitude) / 100.0,
            speed_kmh: speed_kmh(nav.ecef_velocity),
            timestamp_ms: unix_time_ms(nav.week, nav.time_of_week),
        }
    }

    /// Sample time as UTC
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// Magnitude of an ECEF velocity in cm/s, as km/h
pub fn speed_kmh(velocity: [i32; 3]) -> f64 {
    let squared: f64 = velocity.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    squared.sqrt() * 0.01 * 3.6
}

/// Week number and time of week to Unix milliseconds. Leap seconds are not applied.
pub fn unix_time_ms(week: u16, time_of_week: u32) -> i64 {
    i64::from(week) * MS_PER_WEEK + i64::from(time_of_week) * TOW_TICK_MS + GNSS_EPOCH_UNIX_MS
}

/// Wait for the next navigation frame and decode it
pub async fn read_fix<T>(transport: &mut T, options: &ReceiveOptions) -> Result<FixSample, FrameError>
where
    T: GpsSerial + ?Sized,
{
    let frame = receive_frame(transport, &[MessageId::NavigationData], options).await?;
    match frame.message()? {
        Message::NavigationData(nav) => Ok(FixSample::from_navigation(&nav)),
        other => Err(MessageError::UnknownId(other.id().as_u8()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::framing::encode;
    use crate::core::protocol::Frame;
    use crate::core::transport::MockGpsSerial;
    use std::collections::VecDeque;

    fn nav() -> NavigationData {
        NavigationData {
            fix_mode: 2,
            satellites: 9,
            week: 2000,
            time_of_week: 0,
            latitude: 600_000_000,
            longitude: 246_000_000,
            ellipsoid_altitude: 12_345,
            ecef_velocity: [3, 4, 0],
            ..Default::default()
        }
    }

    #[test]
    fn test_latitude_scaling_is_exact() {
        let sample = FixSample::from_navigation(&nav());
        assert_eq!(sample.latitude, 60.0);
        assert_eq!(sample.longitude, 24.6);
        assert_eq!(sample.altitude, 123.45);
    }

    #[test]
    fn test_speed_from_velocity() {
        assert!((speed_kmh([3, 4, 0]) - 0.18).abs() < 1e-12);
        assert_eq!(speed_kmh([0, 0, 0]), 0.0);
        assert!((speed_kmh([-1000, 0, 0]) - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_timestamp_week_2000() {
        assert_eq!(unix_time_ms(2000, 0), 1_525_564_800_000);
        assert_eq!(unix_time_ms(2000, 150), 1_525_564_801_500);
        assert_eq!(unix_time_ms(0, 0), GNSS_EPOCH_UNIX_MS);

        let sample = FixSample::from_navigation(&nav());
        let when = sample.datetime().unwrap();
        assert_eq!(when.to_rfc3339(), "2018-05-06T00:00:00+00:00");
    }

    #[test]
    fn test_fix_mode_mapping() {
        assert_eq!(FixMode::from(0), FixMode::NoFix);
        assert_eq!(FixMode::from(1), FixMode::Fix2D);
        assert_eq!(FixMode::from(2), FixMode::Fix3D);
        assert_eq!(FixMode::from(3), FixMode::Fix3DDgps);
        assert_eq!(FixMode::from(7), FixMode::NoFix);
        assert!(!FixMode::NoFix.has_fix());
        assert!(FixMode::Fix2D.has_fix());
    }

    #[tokio::test]
    async fn test_read_fix_from_stream() {
        let mut bytes = encode(&[0x83, 0x09]);
        bytes.extend_from_slice(&Frame::from_message(&Message::NavigationData(nav())).encode());
        let mut queue: VecDeque<u8> = bytes.into();
        let mut mock = MockGpsSerial::new();
        mock.expect_read_byte().returning(move |_| Ok(queue.pop_front()));

        let sample = read_fix(&mut mock, &ReceiveOptions::default()).await.unwrap();
        assert_eq!(sample.fix_mode, FixMode::Fix3D);
        assert_eq!(sample.satellites, 9);
        assert_eq!(sample.timestamp_ms, 1_525_564_800_000);
    }

    #[tokio::test]
    async fn test_short_navigation_payload_is_malformed() {
        let mut queue: VecDeque<u8> = encode(&[0xA8, 0x02, 0x09]).into();
        let mut mock = MockGpsSerial::new();
        mock.expect_read_byte().returning(move |_| Ok(queue.pop_front()));

        let result = read_fix(&mut mock, &ReceiveOptions::default()).await;
        assert!(matches!(result, Err(FrameError::Malformed(MessageError::Length { .. }))));
    }
}
