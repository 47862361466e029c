//! Transport layer for the receiver link
//!
//! The link only needs a byte-oriented serial line with per-call timeouts
//! and the ability to change the line settings while running:
//! - `GpsSerial` is the contract the frame codec, provisioner and reader use
//! - `SerialTransport` implements it over a host serial port
//! - `core::simulator::SimulatedReceiver` implements it for tests

mod serial;

pub use serial::{list_ports, SerialConfig, SerialParity, SerialTransport};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Opening the port failed for another reason
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The line settings could not be applied
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Port was never opened
    #[error("Not connected")]
    NotConnected,

    /// Port went away while in use
    #[error("Disconnected")]
    Disconnected,
}

/// Line settings applied with [`GpsSerial::configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSettings {
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Baud rate
    pub baud_rate: u32,
}

impl LineSettings {
    /// 8 data bits, no parity, 1 stop bit
    pub fn eight_n_one(baud_rate: u32) -> Self {
        Self {
            data_bits: 8,
            parity: SerialParity::None,
            stop_bits: 1,
            baud_rate,
        }
    }
}

impl Default for LineSettings {
    fn default() -> Self {
        Self::eight_n_one(9600)
    }
}

impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baud ({}{}{})",
            self.baud_rate,
            self.data_bits,
            match self.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.stop_bits
        )
    }
}

/// Byte-level serial line used to talk to the receiver.
///
/// Exactly one user (provisioning or runtime reading) holds `&mut` access at a
/// time. Timeouts are wall-clock and measured on the tokio clock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GpsSerial: Send {
    /// Write one byte
    async fn put_c(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Read one byte, waiting at most `timeout`. `Ok(None)` means the
    /// timeout elapsed.
    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError>;

    /// Discard any buffered input
    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Apply new line settings
    async fn configure(&mut self, settings: LineSettings) -> Result<(), TransportError>;

    /// Human-readable description of the line
    fn connection_info(&self) -> String;
}
