//! Binary frame codec
//!
//! Wire layout: `A0 A1 | len (u16 BE) | payload | xor(payload) | 0D 0A`.
//!
//! `send_message`/`receive_frame` run against a [`GpsSerial`] one byte at a
//! time. `FrameDecoder` extracts frames from byte buffers.

use super::checksum::{verify, xor_checksum};
use super::message::{Message, MessageError, MessageId};
use crate::core::transport::{GpsSerial, TransportError};
use bytes::{Buf, Bytes, BytesMut};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Start of sequence
pub const START_MARKER: [u8; 2] = [0xA0, 0xA1];
/// End of sequence
pub const END_MARKER: [u8; 2] = [0x0D, 0x0A];
/// Largest payload accepted
pub const MAX_PAYLOAD_LEN: usize = 256;
/// Markers, length and checksum
pub const FRAME_OVERHEAD: usize = 7;
/// Default receive budget
pub const DEFAULT_RX_WAIT: Duration = Duration::from_millis(2000);

/// Frame receive errors
#[derive(Error, Debug)]
pub enum FrameError {
    /// Nothing usable arrived within the budget
    #[error("timed out waiting for frame")]
    Timeout,

    /// A frame arrived with a corrupted payload
    #[error("checksum mismatch (expected 0x{expected:02X}, received 0x{actual:02X})")]
    ChecksumMismatch {
        /// Checksum computed over the payload
        expected: u8,
        /// Checksum byte received
        actual: u8,
    },

    /// The frame was intact but its payload does not fit the message layout
    #[error("malformed payload: {0}")]
    Malformed(#[from] MessageError),

    /// Transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// One frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Wrap a payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        Self { payload }
    }

    /// Frame carrying an encoded message
    pub fn from_message(message: &Message) -> Self {
        Self::new(message.encode())
    }

    /// Message id (first payload byte)
    pub fn message_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// XOR checksum of the payload
    pub fn checksum(&self) -> u8 {
        xor_checksum(&self.payload)
    }

    /// Decode the payload
    pub fn message(&self) -> Result<Message, MessageError> {
        Message::decode(&self.payload)
    }

    /// Full wire encoding
    pub fn encode(&self) -> Vec<u8> {
        encode(&self.payload)
    }
}

/// Wrap a payload in markers, length and checksum
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut result = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    result.extend_from_slice(&START_MARKER);
    result.extend_from_slice(&len.to_be_bytes());
    result.extend_from_slice(payload);
    result.push(xor_checksum(payload));
    result.extend_from_slice(&END_MARKER);
    result
}

/// Encode a message and write it byte by byte
pub async fn send_message<T>(transport: &mut T, message: &Message) -> Result<(), TransportError>
where
    T: GpsSerial + ?Sized,
{
    let bytes = Frame::from_message(message).encode();
    trace!(id = %message.id(), frame = %hex::encode(&bytes), "tx");
    for byte in bytes {
        transport.put_c(byte).await?;
    }
    Ok(())
}

/// Timeouts used while waiting for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Wait for each individual byte
    pub byte_timeout: Duration,
    /// Wall-clock budget for the whole receive
    pub budget: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            byte_timeout: DEFAULT_RX_WAIT,
            budget: DEFAULT_RX_WAIT,
        }
    }
}

/// Formats a byte as `0xNN` in log fields
pub(crate) struct HexByte(pub u8);

impl std::fmt::Display for HexByte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

enum Attempt {
    Frame(Frame),
    ChecksumMismatch { id: u8, expected: u8, actual: u8 },
    BadEndMarker,
}

async fn read<T>(transport: &mut T, timeout: Duration) -> Result<u8, FrameError>
where
    T: GpsSerial + ?Sized,
{
    transport.read_byte(timeout).await?.ok_or(FrameError::Timeout)
}

/// Scan for the start marker, sliding one byte at a time over noise
async fn sync<T>(transport: &mut T, options: &ReceiveOptions, started: Instant) -> Result<bool, FrameError>
where
    T: GpsSerial + ?Sized,
{
    let mut previous = read(transport, options.byte_timeout).await?;
    loop {
        let current = read(transport, options.byte_timeout).await?;
        if [previous, current] == START_MARKER {
            return Ok(true);
        }
        if started.elapsed() >= options.budget {
            return Ok(false);
        }
        previous = current;
    }
}

/// Read the rest of a frame after its start marker
async fn read_body<T>(transport: &mut T, timeout: Duration) -> Result<Attempt, FrameError>
where
    T: GpsSerial + ?Sized,
{
    let len = u16::from_be_bytes([read(transport, timeout).await?, read(transport, timeout).await?]) as usize;

    let mut payload = BytesMut::with_capacity(len.min(MAX_PAYLOAD_LEN));
    if len <= MAX_PAYLOAD_LEN {
        for _ in 0..len {
            payload.extend_from_slice(&[read(transport, timeout).await?]);
        }
    } else {
        debug!(len, "declared length exceeds maximum, payload skipped");
    }

    let actual = read(transport, timeout).await?;
    if len > MAX_PAYLOAD_LEN || !verify(&payload, actual) {
        return Ok(Attempt::ChecksumMismatch {
            id: payload.first().copied().unwrap_or_default(),
            expected: xor_checksum(&payload),
            actual,
        });
    }

    let end = [read(transport, timeout).await?, read(transport, timeout).await?];
    if end != END_MARKER {
        return Ok(Attempt::BadEndMarker);
    }

    Ok(Attempt::Frame(Frame::new(payload.freeze())))
}

/// Wait for a frame whose id is one of `expected`.
///
/// Frames with other ids are logged and skipped. A frame with a bad checksum
/// is logged and the wait continues with the bytes that follow it. A byte
/// missing mid-frame ends the wait with `Timeout`. When the budget runs out
/// or the line goes quiet, the result is `ChecksumMismatch` if the last frame
/// seen was corrupted, otherwise `Timeout`.
pub async fn receive_frame<T>(
    transport: &mut T,
    expected: &[MessageId],
    options: &ReceiveOptions,
) -> Result<Frame, FrameError>
where
    T: GpsSerial + ?Sized,
{
    let started = Instant::now();
    let mut last_error = FrameError::Timeout;

    loop {
        let synced = match sync(transport, options, started).await {
            Ok(synced) => synced,
            Err(FrameError::Timeout) => return Err(last_error),
            Err(e) => return Err(e),
        };

        if synced {
            match read_body(transport, options.byte_timeout).await? {
                Attempt::Frame(frame) => {
                    let id = frame.message_id().unwrap_or_default();
                    if expected.iter().any(|e| e.as_u8() == id) {
                        trace!(frame = %hex::encode(frame.payload()), "rx");
                        return Ok(frame);
                    }
                    debug!(id = %HexByte(id), ?expected, "unexpected message id");
                    last_error = FrameError::Timeout;
                }
                Attempt::ChecksumMismatch { id, expected, actual } => {
                    warn!(
                        id = %HexByte(id),
                        expected = %HexByte(expected),
                        actual = %HexByte(actual),
                        "checksum mismatch"
                    );
                    last_error = FrameError::ChecksumMismatch { expected, actual };
                }
                Attempt::BadEndMarker => {
                    debug!("bad end marker, frame dropped");
                }
            }
        }

        if started.elapsed() >= options.budget {
            return Err(last_error);
        }
    }
}

/// Streaming frame decoder that handles partial data
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    dropped: usize,
}

impl FrameDecoder {
    /// Create new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add data and return complete, valid frames. Incomplete data stays
    /// buffered; corrupted frames are skipped by resyncing one byte further.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            match self.buffer.windows(2).position(|w| w == START_MARKER) {
                Some(start) => {
                    self.dropped += start;
                    self.buffer.advance(start);
                }
                None => {
                    // keep a trailing 0xA0, it may be the first marker byte
                    let keep = usize::from(self.buffer.last() == Some(&START_MARKER[0]));
                    let discard = self.buffer.len() - keep;
                    self.dropped += discard;
                    self.buffer.advance(discard);
                    break;
                }
            }

            if self.buffer.len() < 4 {
                break;
            }
            let len = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
            if len > MAX_PAYLOAD_LEN {
                self.skip_byte();
                continue;
            }
            let total = len + FRAME_OVERHEAD;
            if self.buffer.len() < total {
                break;
            }

            let payload = &self.buffer[4..4 + len];
            let valid = xor_checksum(payload) == self.buffer[4 + len] && self.buffer[5 + len..total] == END_MARKER;
            if !valid {
                self.skip_byte();
                continue;
            }

            let frame = self.buffer.split_to(total);
            frames.push(Frame::new(Bytes::copy_from_slice(&frame[4..4 + len])));
        }

        frames
    }

    fn skip_byte(&mut self) {
        self.buffer.advance(1);
        self.dropped += 1;
    }

    /// Bytes discarded while searching for frames
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Bytes waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

}

/// Decode every complete frame in a buffer
pub fn decode(data: &[u8]) -> Vec<Frame> {
    FrameDecoder::new().push(data)
}
