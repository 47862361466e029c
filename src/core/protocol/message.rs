//! Binary message catalog
//!
//! Every payload starts with a message id byte followed by a fixed layout of
//! fields. Multi-byte integers are big-endian on the wire; `bytes::Buf` and
//! `bytes::BufMut` do the byte order conversion.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sub id carried by the navigation mode command
pub const NAVIGATION_MODE_SUB_ID: u8 = 0x17;

/// Message ids understood by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    /// Query software version
    QuerySoftwareVersion = 0x02,
    /// Restore factory defaults
    SetFactoryDefaults = 0x04,
    /// Configure serial port baud rate
    ConfigureSerialPort = 0x05,
    /// Configure NMEA sentence intervals
    ConfigureNmeaMessage = 0x08,
    /// Configure output message type
    ConfigureMessageType = 0x09,
    /// Configure position update rate
    ConfigurePositionUpdateRate = 0x0E,
    /// Query position update rate
    QueryPositionUpdateRate = 0x10,
    /// Configure navigation data message interval
    ConfigureNavigationDataInterval = 0x11,
    /// Configure navigation (dynamics) mode
    ConfigureNavigationMode = 0x64,
    /// Software version response
    SoftwareVersion = 0x80,
    /// Positive acknowledgment
    Ack = 0x83,
    /// Negative acknowledgment
    Nack = 0x84,
    /// Position update rate response
    PositionUpdateRate = 0x86,
    /// Navigation data (fix report)
    NavigationData = 0xA8,
}

impl MessageId {
    /// All known ids
    pub const ALL: [MessageId; 14] = [
        MessageId::QuerySoftwareVersion,
        MessageId::SetFactoryDefaults,
        MessageId::ConfigureSerialPort,
        MessageId::ConfigureNmeaMessage,
        MessageId::ConfigureMessageType,
        MessageId::ConfigurePositionUpdateRate,
        MessageId::QueryPositionUpdateRate,
        MessageId::ConfigureNavigationDataInterval,
        MessageId::ConfigureNavigationMode,
        MessageId::SoftwareVersion,
        MessageId::Ack,
        MessageId::Nack,
        MessageId::PositionUpdateRate,
        MessageId::NavigationData,
    ];

    /// Raw id byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get name of message
    pub fn name(self) -> &'static str {
        match self {
            MessageId::QuerySoftwareVersion => "QuerySoftwareVersion",
            MessageId::SetFactoryDefaults => "SetFactoryDefaults",
            MessageId::ConfigureSerialPort => "ConfigureSerialPort",
            MessageId::ConfigureNmeaMessage => "ConfigureNmeaMessage",
            MessageId::ConfigureMessageType => "ConfigureMessageType",
            MessageId::ConfigurePositionUpdateRate => "ConfigurePositionUpdateRate",
            MessageId::QueryPositionUpdateRate => "QueryPositionUpdateRate",
            MessageId::ConfigureNavigationDataInterval => "ConfigureNavigationDataInterval",
            MessageId::ConfigureNavigationMode => "ConfigureNavigationMode",
            MessageId::SoftwareVersion => "SoftwareVersion",
            MessageId::Ack => "Ack",
            MessageId::Nack => "Nack",
            MessageId::PositionUpdateRate => "PositionUpdateRate",
            MessageId::NavigationData => "NavigationData",
        }
    }

    /// Minimum payload length, id byte included
    pub fn payload_len(self) -> usize {
        match self {
            MessageId::QueryPositionUpdateRate => 1,
            MessageId::QuerySoftwareVersion
            | MessageId::SetFactoryDefaults
            | MessageId::Ack
            | MessageId::Nack
            | MessageId::PositionUpdateRate => 2,
            MessageId::ConfigureMessageType
            | MessageId::ConfigurePositionUpdateRate
            | MessageId::ConfigureNavigationDataInterval => 3,
            MessageId::ConfigureSerialPort | MessageId::ConfigureNavigationMode => 4,
            MessageId::ConfigureNmeaMessage => 9,
            MessageId::SoftwareVersion => 14,
            MessageId::NavigationData => NavigationData::PAYLOAD_LEN,
        }
    }
}

impl TryFrom<u8> for MessageId {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MessageId::ALL
            .into_iter()
            .find(|id| id.as_u8() == value)
            .ok_or(MessageError::UnknownId(value))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.as_u8())
    }
}

/// Payload decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Zero-length payload
    #[error("empty payload")]
    Empty,

    /// Id byte not in the catalog
    #[error("unknown message id 0x{0:02X}")]
    UnknownId(u8),

    /// Payload shorter than the message layout
    #[error("{id}: payload is {actual} bytes, expected {expected}")]
    Length {
        /// Message being decoded
        id: MessageId,
        /// Required length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// Field value outside its enumeration
    #[error("{id}: invalid {field} value {value}")]
    InvalidField {
        /// Message being decoded
        id: MessageId,
        /// Field name
        field: &'static str,
        /// Offending byte
        value: u8,
    },
}

/// Where a configuration change is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Attribute {
    /// Volatile memory only
    Volatile = 0,
    /// Volatile and non-volatile memory, survives a power cycle
    #[default]
    VolatileAndNonVolatile = 1,
    /// Temporary, reverted on the next command
    Temporary = 2,
}

impl TryFrom<u8> for Attribute {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::Volatile),
            1 => Ok(Self::VolatileAndNonVolatile),
            2 => Ok(Self::Temporary),
            other => Err(other),
        }
    }
}

/// Receiver dynamics model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NavigationMode {
    /// Let the receiver choose
    Automatic = 0,
    /// Walking speeds
    Pedestrian = 1,
    /// Road vehicle
    #[default]
    Automobile = 2,
    /// Boat
    Marine = 3,
    /// Balloon
    Balloon = 4,
    /// Aircraft
    Airborne = 5,
}

impl TryFrom<u8> for NavigationMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::Automatic),
            1 => Ok(Self::Pedestrian),
            2 => Ok(Self::Automobile),
            3 => Ok(Self::Marine),
            4 => Ok(Self::Balloon),
            5 => Ok(Self::Airborne),
            other => Err(other),
        }
    }
}

impl std::str::FromStr for NavigationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "automatic" | "auto" => Ok(Self::Automatic),
            "pedestrian" => Ok(Self::Pedestrian),
            "automobile" | "car" => Ok(Self::Automobile),
            "marine" => Ok(Self::Marine),
            "balloon" => Ok(Self::Balloon),
            "airborne" => Ok(Self::Airborne),
            other => Err(format!("unknown navigation mode '{other}'")),
        }
    }
}

/// Output message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// No output
    None = 0,
    /// NMEA text sentences
    Nmea = 1,
    /// Binary messages
    Binary = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Nmea),
            2 => Ok(Self::Binary),
            other => Err(other),
        }
    }
}

/// NMEA sentence intervals in seconds, 0 disables a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NmeaIntervals {
    /// GGA (fix data)
    pub gga: u8,
    /// GSA (DOP and active satellites)
    pub gsa: u8,
    /// GSV (satellites in view)
    pub gsv: u8,
    /// GLL (geographic position)
    pub gll: u8,
    /// RMC (recommended minimum)
    pub rmc: u8,
    /// VTG (track and ground speed)
    pub vtg: u8,
    /// ZDA (time and date)
    pub zda: u8,
}

impl NmeaIntervals {
    /// RMC once a second, everything else off
    pub fn default_profile() -> Self {
        Self {
            rmc: 1,
            ..Self::disabled()
        }
    }

    /// All sentences off
    pub fn disabled() -> Self {
        Self::default()
    }

    /// True if no sentence is enabled
    pub fn is_disabled(&self) -> bool {
        *self == Self::disabled()
    }

    fn put(&self, buf: &mut BytesMut) {
        for interval in [self.gga, self.gsa, self.gsv, self.gll, self.rmc, self.vtg, self.zda] {
            buf.put_u8(interval);
        }
    }

    fn take(body: &mut &[u8]) -> Self {
        Self {
            gga: body.get_u8(),
            gsa: body.get_u8(),
            gsv: body.get_u8(),
            gll: body.get_u8(),
            rmc: body.get_u8(),
            vtg: body.get_u8(),
            zda: body.get_u8(),
        }
    }
}

/// Software version report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftwareVersion {
    /// Software type (1 = system code)
    pub software_type: u8,
    /// Kernel version, `00.XX.YY.ZZ`
    pub kernel: u32,
    /// ODM version, `00.XX.YY.ZZ`
    pub odm: u32,
    /// Revision date, `00.YY.MM.DD`
    pub revision: u32,
}

fn dotted(value: u32) -> String {
    let [_, a, b, c] = value.to_be_bytes();
    format!("{a}.{b}.{c}")
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kernel {} odm {} revision {}",
            dotted(self.kernel),
            dotted(self.odm),
            dotted(self.revision)
        )
    }
}

/// Navigation data message, raw receiver units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationData {
    /// Fix mode (0 none, 1 2D, 2 3D, 3 3D+DGNSS)
    pub fix_mode: u8,
    /// Satellites used in the fix
    pub satellites: u8,
    /// GNSS week number
    pub week: u16,
    /// Time of week, 1/100 s
    pub time_of_week: u32,
    /// Latitude, 1e-7 degrees
    pub latitude: i32,
    /// Longitude, 1e-7 degrees
    pub longitude: i32,
    /// Ellipsoid altitude, cm
    pub ellipsoid_altitude: i32,
    /// Mean sea level altitude, cm
    pub mean_sea_level_altitude: i32,
    /// Geometric DOP, 0.01
    pub gdop: u16,
    /// Position DOP, 0.01
    pub pdop: u16,
    /// Horizontal DOP, 0.01
    pub hdop: u16,
    /// Vertical DOP, 0.01
    pub vdop: u16,
    /// Time DOP, 0.01
    pub tdop: u16,
    /// ECEF position, cm
    pub ecef: [i32; 3],
    /// ECEF velocity, cm/s
    pub ecef_velocity: [i32; 3],
}

impl NavigationData {
    /// Payload length, id byte included
    pub const PAYLOAD_LEN: usize = 59;

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u8(self.fix_mode);
        buf.put_u8(self.satellites);
        buf.put_u16(self.week);
        buf.put_u32(self.time_of_week);
        buf.put_i32(self.latitude);
        buf.put_i32(self.longitude);
        buf.put_i32(self.ellipsoid_altitude);
        buf.put_i32(self.mean_sea_level_altitude);
        for dop in [self.gdop, self.pdop, self.hdop, self.vdop, self.tdop] {
            buf.put_u16(dop);
        }
        for axis in self.ecef.iter().chain(self.ecef_velocity.iter()) {
            buf.put_i32(*axis);
        }
    }

    fn take(body: &mut &[u8]) -> Self {
        Self {
            fix_mode: body.get_u8(),
            satellites: body.get_u8(),
            week: body.get_u16(),
            time_of_week: body.get_u32(),
            latitude: body.get_i32(),
            longitude: body.get_i32(),
            ellipsoid_altitude: body.get_i32(),
            mean_sea_level_altitude: body.get_i32(),
            gdop: body.get_u16(),
            pdop: body.get_u16(),
            hdop: body.get_u16(),
            vdop: body.get_u16(),
            tdop: body.get_u16(),
            ecef: [body.get_i32(), body.get_i32(), body.get_i32()],
            ecef_velocity: [body.get_i32(), body.get_i32(), body.get_i32()],
        }
    }
}

/// A decoded payload, one variant per message id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Query software version
    QuerySoftwareVersion {
        /// Software type, 0 = reserved
        software_type: u8,
    },
    /// Restore factory defaults
    SetFactoryDefaults {
        /// 1 = reboot after restoring
        kind: u8,
    },
    /// Configure serial port baud rate
    ConfigureSerialPort {
        /// COM port, 0 = first
        com_port: u8,
        /// Receiver baud code
        baud_code: u8,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Configure NMEA sentence intervals
    ConfigureNmeaMessage {
        /// Per-sentence intervals
        intervals: NmeaIntervals,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Configure output message type
    ConfigureMessageType {
        /// Output type
        kind: MessageType,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Configure position update rate
    ConfigurePositionUpdateRate {
        /// Update rate in Hz
        rate: u8,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Query position update rate
    QueryPositionUpdateRate,
    /// Configure navigation data message interval
    ConfigureNavigationDataInterval {
        /// Interval in position updates, 0 disables
        interval: u8,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Configure navigation mode
    ConfigureNavigationMode {
        /// Dynamics model
        mode: NavigationMode,
        /// Storage attribute
        attributes: Attribute,
    },
    /// Software version response
    SoftwareVersion(SoftwareVersion),
    /// Positive acknowledgment
    Ack {
        /// Id of the acknowledged command
        acked_id: u8,
    },
    /// Negative acknowledgment
    Nack {
        /// Id of the rejected command
        nacked_id: u8,
    },
    /// Position update rate response
    PositionUpdateRate {
        /// Update rate in Hz
        rate: u8,
    },
    /// Navigation data
    NavigationData(NavigationData),
}

fn field<T: TryFrom<u8, Error = u8>>(id: MessageId, field: &'static str, value: u8) -> Result<T, MessageError> {
    T::try_from(value).map_err(|value| MessageError::InvalidField { id, field, value })
}

impl Message {
    /// Software version query
    pub fn query_software_version() -> Self {
        Self::QuerySoftwareVersion { software_type: 0 }
    }

    /// Factory reset followed by a reboot
    pub fn set_factory_defaults() -> Self {
        Self::SetFactoryDefaults { kind: 1 }
    }

    /// Switch the receiver's first COM port to `baud_code`
    pub fn configure_serial_port(baud_code: u8, attributes: Attribute) -> Self {
        Self::ConfigureSerialPort {
            com_port: 0,
            baud_code,
            attributes,
        }
    }

    /// Set NMEA sentence intervals
    pub fn configure_nmea(intervals: NmeaIntervals, attributes: Attribute) -> Self {
        Self::ConfigureNmeaMessage { intervals, attributes }
    }

    /// Select the output message type
    pub fn configure_message_type(kind: MessageType, attributes: Attribute) -> Self {
        Self::ConfigureMessageType { kind, attributes }
    }

    /// Set the position update rate
    pub fn configure_update_rate(rate: u8, attributes: Attribute) -> Self {
        Self::ConfigurePositionUpdateRate { rate, attributes }
    }

    /// Position update rate query
    pub fn query_update_rate() -> Self {
        Self::QueryPositionUpdateRate
    }

    /// Emit navigation data every `interval` position updates
    pub fn configure_navigation_interval(interval: u8, attributes: Attribute) -> Self {
        Self::ConfigureNavigationDataInterval { interval, attributes }
    }

    /// Set the dynamics model
    pub fn configure_navigation_mode(mode: NavigationMode, attributes: Attribute) -> Self {
        Self::ConfigureNavigationMode { mode, attributes }
    }

    /// Message id of this payload
    pub fn id(&self) -> MessageId {
        match self {
            Self::QuerySoftwareVersion { .. } => MessageId::QuerySoftwareVersion,
            Self::SetFactoryDefaults { .. } => MessageId::SetFactoryDefaults,
            Self::ConfigureSerialPort { .. } => MessageId::ConfigureSerialPort,
            Self::ConfigureNmeaMessage { .. } => MessageId::ConfigureNmeaMessage,
            Self::ConfigureMessageType { .. } => MessageId::ConfigureMessageType,
            Self::ConfigurePositionUpdateRate { .. } => MessageId::ConfigurePositionUpdateRate,
            Self::QueryPositionUpdateRate => MessageId::QueryPositionUpdateRate,
            Self::ConfigureNavigationDataInterval { .. } => MessageId::ConfigureNavigationDataInterval,
            Self::ConfigureNavigationMode { .. } => MessageId::ConfigureNavigationMode,
            Self::SoftwareVersion(_) => MessageId::SoftwareVersion,
            Self::Ack { .. } => MessageId::Ack,
            Self::Nack { .. } => MessageId::Nack,
            Self::PositionUpdateRate { .. } => MessageId::PositionUpdateRate,
            Self::NavigationData(_) => MessageId::NavigationData,
        }
    }

    /// Encode into a payload (id byte first)
    pub fn encode(&self) -> Bytes {
        let id = self.id();
        let mut buf = BytesMut::with_capacity(id.payload_len());
        buf.put_u8(id.as_u8());

        match self {
            Self::QuerySoftwareVersion { software_type } => buf.put_u8(*software_type),
            Self::SetFactoryDefaults { kind } => buf.put_u8(*kind),
            Self::ConfigureSerialPort {
                com_port,
                baud_code,
                attributes,
            } => {
                buf.put_u8(*com_port);
                buf.put_u8(*baud_code);
                buf.put_u8(*attributes as u8);
            }
            Self::ConfigureNmeaMessage { intervals, attributes } => {
                intervals.put(&mut buf);
                buf.put_u8(*attributes as u8);
            }
            Self::ConfigureMessageType { kind, attributes } => {
                buf.put_u8(*kind as u8);
                buf.put_u8(*attributes as u8);
            }
            Self::ConfigurePositionUpdateRate { rate, attributes } => {
                buf.put_u8(*rate);
                buf.put_u8(*attributes as u8);
            }
            Self::QueryPositionUpdateRate => {}
            Self::ConfigureNavigationDataInterval { interval, attributes } => {
                buf.put_u8(*interval);
                buf.put_u8(*attributes as u8);
            }
            Self::ConfigureNavigationMode { mode, attributes } => {
                buf.put_u8(NAVIGATION_MODE_SUB_ID);
                buf.put_u8(*mode as u8);
                buf.put_u8(*attributes as u8);
            }
            Self::SoftwareVersion(version) => {
                buf.put_u8(version.software_type);
                buf.put_u32(version.kernel);
                buf.put_u32(version.odm);
                buf.put_u32(version.revision);
            }
            Self::Ack { acked_id } => buf.put_u8(*acked_id),
            Self::Nack { nacked_id } => buf.put_u8(*nacked_id),
            Self::PositionUpdateRate { rate } => buf.put_u8(*rate),
            Self::NavigationData(nav) => nav.put(&mut buf),
        }

        debug_assert_eq!(buf.len(), id.payload_len());
        buf.freeze()
    }

    /// Decode a payload (id byte first). Bytes beyond the layout are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let (&id_byte, mut body) = payload.split_first().ok_or(MessageError::Empty)?;
        let id = MessageId::try_from(id_byte)?;

        let expected = id.payload_len();
        if payload.len() < expected {
            return Err(MessageError::Length {
                id,
                expected,
                actual: payload.len(),
            });
        }

        let message = match id {
            MessageId::QuerySoftwareVersion => Self::QuerySoftwareVersion {
                software_type: body.get_u8(),
            },
            MessageId::SetFactoryDefaults => Self::SetFactoryDefaults { kind: body.get_u8() },
            MessageId::ConfigureSerialPort => Self::ConfigureSerialPort {
                com_port: body.get_u8(),
                baud_code: body.get_u8(),
                attributes: field(id, "attributes", body.get_u8())?,
            },
            MessageId::ConfigureNmeaMessage => Self::ConfigureNmeaMessage {
                intervals: NmeaIntervals::take(&mut body),
                attributes: field(id, "attributes", body.get_u8())?,
            },
            MessageId::ConfigureMessageType => Self::ConfigureMessageType {
                kind: field(id, "type", body.get_u8())?,
                attributes: field(id, "attributes", body.get_u8())?,
            },
            MessageId::ConfigurePositionUpdateRate => Self::ConfigurePositionUpdateRate {
                rate: body.get_u8(),
                attributes: field(id, "attributes", body.get_u8())?,
            },
            MessageId::QueryPositionUpdateRate => Self::QueryPositionUpdateRate,
            MessageId::ConfigureNavigationDataInterval => Self::ConfigureNavigationDataInterval {
                interval: body.get_u8(),
                attributes: field(id, "attributes", body.get_u8())?,
            },
            MessageId::ConfigureNavigationMode => {
                let sub_id = body.get_u8();
                if sub_id != NAVIGATION_MODE_SUB_ID {
                    return Err(MessageError::InvalidField {
                        id,
                        field: "sub id",
                        value: sub_id,
                    });
                }
                Self::ConfigureNavigationMode {
                    mode: field(id, "navigation mode", body.get_u8())?,
                    attributes: field(id, "attributes", body.get_u8())?,
                }
            }
            MessageId::SoftwareVersion => Self::SoftwareVersion(SoftwareVersion {
                software_type: body.get_u8(),
                kernel: body.get_u32(),
                odm: body.get_u32(),
                revision: body.get_u32(),
            }),
            MessageId::Ack => Self::Ack { acked_id: body.get_u8() },
            MessageId::Nack => Self::Nack { nacked_id: body.get_u8() },
            MessageId::PositionUpdateRate => Self::PositionUpdateRate { rate: body.get_u8() },
            MessageId::NavigationData => Self::NavigationData(NavigationData::take(&mut body)),
        };

        Ok(message)
    }
}

/// A baud rate and the receiver's code for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudRate {
    /// Bits per second
    pub baud: u32,
    /// Code used by `ConfigureSerialPort`
    pub code: u8,
}

/// Rates probed during provisioning, in probing order
pub const PROBE_BAUD_RATES: [BaudRate; 2] = [
    BaudRate { baud: 921_600, code: 8 },
    BaudRate { baud: 9600, code: 1 },
];

/// Every rate the receiver can be switched to
pub const RECEIVER_BAUD_RATES: [BaudRate; 9] = [
    BaudRate { baud: 4800, code: 0 },
    BaudRate { baud: 9600, code: 1 },
    BaudRate { baud: 19_200, code: 2 },
    BaudRate { baud: 38_400, code: 3 },
    BaudRate { baud: 57_600, code: 4 },
    BaudRate { baud: 115_200, code: 5 },
    BaudRate { baud: 230_400, code: 6 },
    BaudRate { baud: 460_800, code: 7 },
    BaudRate { baud: 921_600, code: 8 },
];

/// Receiver code for a baud rate
pub fn code_for_baud(baud: u32) -> Option<u8> {
    RECEIVER_BAUD_RATES.iter().find(|rate| rate.baud == baud).map(|rate| rate.code)
}

/// Baud rate for a receiver code
pub fn baud_for_code(code: u8) -> Option<u32> {
    RECEIVER_BAUD_RATES.iter().find(|rate| rate.code == code).map(|rate| rate.baud)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_layouts() {
        let attr = Attribute::VolatileAndNonVolatile;
        assert_eq!(&Message::query_software_version().encode()[..], &[0x02, 0x00]);
        assert_eq!(&Message::set_factory_defaults().encode()[..], &[0x04, 0x01]);
        assert_eq!(&Message::configure_serial_port(8, attr).encode()[..], &[0x05, 0x00, 0x08, 0x01]);
        assert_eq!(&Message::query_update_rate().encode()[..], &[0x10]);
        assert_eq!(&Message::configure_update_rate(10, attr).encode()[..], &[0x0E, 10, 0x01]);
        assert_eq!(
            &Message::configure_message_type(MessageType::Binary, attr).encode()[..],
            &[0x09, 0x02, 0x01]
        );
        assert_eq!(&Message::configure_navigation_interval(1, attr).encode()[..], &[0x11, 0x01, 0x01]);
        assert_eq!(
            &Message::configure_navigation_mode(NavigationMode::Automobile, attr).encode()[..],
            &[0x64, 0x17, 0x02, 0x01]
        );
        assert_eq!(
            &Message::configure_nmea(NmeaIntervals::default_profile(), attr).encode()[..],
            &[0x08, 0, 0, 0, 0, 1, 0, 0, 0x01]
        );
    }

    #[test]
    fn test_every_id_has_its_declared_length() {
        let messages = [
            Message::query_software_version(),
            Message::set_factory_defaults(),
            Message::configure_serial_port(1, Attribute::Volatile),
            Message::configure_nmea(NmeaIntervals::disabled(), Attribute::Temporary),
            Message::configure_message_type(MessageType::Nmea, Attribute::Volatile),
            Message::configure_update_rate(5, Attribute::Volatile),
            Message::query_update_rate(),
            Message::configure_navigation_interval(1, Attribute::Volatile),
            Message::configure_navigation_mode(NavigationMode::Marine, Attribute::Volatile),
            Message::SoftwareVersion(SoftwareVersion::default()),
            Message::Ack { acked_id: 0x05 },
            Message::Nack { nacked_id: 0x05 },
            Message::PositionUpdateRate { rate: 10 },
            Message::NavigationData(NavigationData::default()),
        ];
        for message in messages {
            let payload = message.encode();
            assert_eq!(payload.len(), message.id().payload_len(), "{}", message.id());
            assert_eq!(Message::decode(&payload), Ok(message));
        }
    }

    #[test]
    fn test_ack_with_sub_id_decodes() {
        let decoded = Message::decode(&[0x83, 0x64, 0x17]).unwrap();
        assert_eq!(decoded, Message::Ack { acked_id: 0x64 });
    }

    #[test]
    fn test_navigation_data_is_big_endian() {
        let mut payload = vec![0u8; NavigationData::PAYLOAD_LEN];
        payload[0] = 0xA8;
        payload[1] = 2;
        payload[2] = 9;
        payload[3..5].copy_from_slice(&2000u16.to_be_bytes());
        payload[9..13].copy_from_slice(&600_000_000i32.to_be_bytes());
        payload[13..17].copy_from_slice(&(-1_234_567_890i32).to_be_bytes());

        let Message::NavigationData(nav) = Message::decode(&payload).unwrap() else {
            panic!("expected navigation data");
        };
        assert_eq!(nav.fix_mode, 2);
        assert_eq!(nav.satellites, 9);
        assert_eq!(nav.week, 2000);
        assert_eq!(nav.latitude, 600_000_000);
        assert_eq!(nav.longitude, -1_234_567_890);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Message::decode(&[]), Err(MessageError::Empty));
        assert_eq!(Message::decode(&[0x55]), Err(MessageError::UnknownId(0x55)));
        assert_eq!(
            Message::decode(&[0xA8, 0x01]),
            Err(MessageError::Length {
                id: MessageId::NavigationData,
                expected: 59,
                actual: 2
            })
        );
        assert_eq!(
            Message::decode(&[0x64, 0x18, 0x02, 0x01]),
            Err(MessageError::InvalidField {
                id: MessageId::ConfigureNavigationMode,
                field: "sub id",
                value: 0x18
            })
        );
        assert!(matches!(
            Message::decode(&[0x09, 0x07, 0x01]),
            Err(MessageError::InvalidField { field: "type", value: 7, .. })
        ));
    }

    #[test]
    fn test_baud_codes() {
        assert_eq!(code_for_baud(921_600), Some(8));
        assert_eq!(code_for_baud(115_200), Some(5));
        assert_eq!(code_for_baud(12_345), None);
        assert_eq!(baud_for_code(1), Some(9600));
        assert_eq!(baud_for_code(9), None);
        for rate in PROBE_BAUD_RATES {
            assert_eq!(code_for_baud(rate.baud), Some(rate.code));
        }
    }

    #[test]
    fn test_software_version_display() {
        let version = SoftwareVersion {
            software_type: 1,
            kernel: 0x0001_0203,
            odm: 0x0001_0401,
            revision: 0x0014_070F,
        };
        assert_eq!(version.to_string(), "kernel 1.2.3 odm 1.4.1 revision 20.7.15");
    }
}
