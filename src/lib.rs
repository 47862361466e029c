//! # gnsslink core library
//!
//! Serial link to a GNSS receiver speaking a binary framed protocol:
//! - Provisioning: baud detection and negotiation, update rate matching,
//!   binary output, navigation mode, NMEA output disabled
//! - Runtime reads of navigation data converted to engineering units
//! - Fix logging as text, CSV or JSON lines
//! - A simulated receiver for tests and demos
//! - CLI with exit codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use gnsslink_core::{GnssReceiver, SerialConfig, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut transport = SerialTransport::new(SerialConfig::new("/dev/ttyUSB0", 9600));
//!     transport.open()?;
//!
//!     let mut receiver = GnssReceiver::new(transport);
//!     if !receiver.provision(10).await {
//!         anyhow::bail!("receiver not provisioned");
//!     }
//!
//!     loop {
//!         let fix = receiver.get_update().await?;
//!         println!("{} {:.7} {:.7}", fix.fix_mode, fix.latitude, fix.longitude);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{ConfigError, GnssConfig};
pub use crate::core::fix_log::{FixLogFormat, FixLogger};
pub use crate::core::protocol::{FrameError, Message, MessageId, NavigationData, NavigationMode};
pub use crate::core::provision::{target_update_rate, CommandError, ProvisionError, ProvisionReport, ProvisionState};
pub use crate::core::reader::{FixMode, FixSample};
pub use crate::core::receiver::{GnssReceiver, LinkSettings};
pub use crate::core::simulator::SimulatedReceiver;
pub use crate::core::transport::{GpsSerial, LineSettings, SerialConfig, SerialTransport, TransportError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
