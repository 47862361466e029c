//! Core module containing the receiver link
//!
//! This module provides:
//! - Transport layer (`GpsSerial` over a host serial port)
//! - Binary protocol (framing, checksum, message catalog)
//! - Provisioning state machine with retries and factory reset
//! - Runtime fix reader
//! - Fix sample logger
//! - Simulated receiver

pub mod fix_log;
pub mod protocol;
pub mod provision;
pub mod reader;
pub mod receiver;
pub mod simulator;
pub mod transport;
