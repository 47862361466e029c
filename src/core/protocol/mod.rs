//! Receiver binary protocol
//!
//! - Checksum (XOR over the payload)
//! - Framing (start/end markers, big-endian length, streaming decoder)
//! - Message catalog (typed commands and responses)

pub mod checksum;
pub mod framing;
pub mod message;

pub use checksum::xor_checksum;
pub use framing::{
    receive_frame, send_message, Frame, FrameDecoder, FrameError, ReceiveOptions, DEFAULT_RX_WAIT, MAX_PAYLOAD_LEN,
};
pub use message::{
    baud_for_code, code_for_baud, Attribute, BaudRate, Message, MessageError, MessageId, MessageType,
    NavigationData, NavigationMode, NmeaIntervals, SoftwareVersion, PROBE_BAUD_RATES, RECEIVER_BAUD_RATES,
};
