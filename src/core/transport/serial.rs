//! Serial port transport implementation

use super::{GpsSerial, LineSettings, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl std::str::FromStr for SerialParity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            other => Err(format!("unknown parity '{other}'")),
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Settings used when the port is opened
    pub line: LineSettings,
}

impl SerialConfig {
    /// Create a new 8N1 serial configuration
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            line: LineSettings::eight_n_one(baud_rate),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", 9600)
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

fn parity(parity: SerialParity) -> Parity {
    match parity {
        SerialParity::Odd => Parity::Odd,
        SerialParity::Even => Parity::Even,
        SerialParity::None => Parity::None,
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a new, not yet opened, serial transport
    pub fn new(config: SerialConfig) -> Self {
        Self { config, stream: None }
    }

    /// Open the port with the configured line settings
    pub fn open(&mut self) -> Result<(), TransportError> {
        let line = self.config.line;
        let stream = tokio_serial::new(&self.config.port, line.baud_rate)
            .data_bits(data_bits(line.data_bits))
            .stop_bits(stop_bits(line.stop_bits))
            .parity(parity(line.parity))
            .open_native_async()
            .map_err(|e| match e.kind() {
                tokio_serial::ErrorKind::NoDevice => TransportError::PortNotFound(self.config.port.clone()),
                tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    TransportError::PortNotFound(self.config.port.clone())
                }
                tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    TransportError::PermissionDenied(self.config.port.clone())
                }
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        tracing::debug!(port = %self.config.port, line = %line, "serial port opened");
        self.stream = Some(stream);
        Ok(())
    }

    /// Is the port open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut SerialStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl GpsSerial for SerialTransport {
    async fn put_c(&mut self, byte: u8) -> Result<(), TransportError> {
        self.stream()?.write_all(&[byte]).await?;
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        let stream = self.stream()?;
        match tokio::time::timeout(timeout, stream.read_u8()).await {
            Err(_) => Ok(None),
            Ok(Ok(byte)) => Ok(Some(byte)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::Disconnected),
            Ok(Err(e)) => Err(TransportError::IoError(e)),
        }
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        let stream = self.stream()?;
        stream.flush().await?;
        stream
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::IoError(e.into()))
    }

    async fn configure(&mut self, settings: LineSettings) -> Result<(), TransportError> {
        let stream = self.stream()?;
        let config_error = |e: tokio_serial::Error| TransportError::ConfigError(e.to_string());
        stream.set_data_bits(data_bits(settings.data_bits)).map_err(config_error)?;
        stream.set_parity(parity(settings.parity)).map_err(config_error)?;
        stream.set_stop_bits(stop_bits(settings.stop_bits)).map_err(config_error)?;
        stream.set_baud_rate(settings.baud_rate).map_err(config_error)?;
        self.config.line = settings;
        tracing::debug!(port = %self.config.port, line = %settings, "serial line reconfigured");
        Ok(())
    }

    fn connection_info(&self) -> String {
        format!("{} @ {}", self.config.port, self.config.line)
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_from_str() {
        assert_eq!("E".parse::<SerialParity>(), Ok(SerialParity::Even));
        assert_eq!("none".parse::<SerialParity>(), Ok(SerialParity::None));
        assert!("mark".parse::<SerialParity>().is_err());
    }

    #[tokio::test]
    async fn test_unopened_port_reports_not_connected() {
        let mut transport = SerialTransport::new(SerialConfig::new("/dev/null-gnss", 9600));
        assert!(!transport.is_open());
        assert!(matches!(transport.put_c(0xA0).await, Err(TransportError::NotConnected)));
        assert!(matches!(
            transport.read_byte(Duration::from_millis(1)).await,
            Err(TransportError::NotConnected)
        ));
        assert_eq!(transport.connection_info(), "/dev/null-gnss @ 9600 baud (8N1)");
    }
}
