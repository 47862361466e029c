//! CLI Exit Codes
//!
//! Exit codes for scripted provisioning and logging runs.

use crate::config::ConfigError;
use crate::core::protocol::FrameError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Opening the port failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Receiver stopped answering
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 5;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 6;

    /// Corrupted or malformed frames
    pub const PROTOCOL_ERROR: u8 = 7;

    /// Receiver could not be provisioned
    pub const PROVISION_FAILED: u8 = 8;

    /// User cancelled
    pub const CANCELLED: u8 = 9;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 10;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;

    /// Every defined code, ascending
    pub const ALL: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 127];
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Success without message
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with message
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Provisioning gave up
    pub fn provision_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::PROVISION_FAILED, msg.into())
    }

    /// Receiver stopped answering
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::TIMEOUT, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) | Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to `ExitCode`
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ExitCodes::PORT_NOT_FOUND,
            ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, err.to_string())
    }
}

impl From<TransportError> for CliResult {
    fn from(err: TransportError) -> Self {
        let code = match &err {
            TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
            TransportError::IoError(e) => return Self::from(std::io::Error::new(e.kind(), err.to_string())),
            TransportError::ConnectionFailed(_)
            | TransportError::ConfigError(_)
            | TransportError::NotConnected
            | TransportError::Disconnected => ExitCodes::CONNECTION_FAILED,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<FrameError> for CliResult {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Timeout => Self::timeout(err.to_string()),
            FrameError::ChecksumMismatch { .. } | FrameError::Malformed(_) => {
                Self::Error(ExitCodes::PROTOCOL_ERROR, err.to_string())
            }
            FrameError::Transport(e) => Self::from(e),
        }
    }
}

impl From<ConfigError> for CliResult {
    fn from(err: ConfigError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Receiver timeout",
        5 => "Permission denied",
        6 => "Configuration error",
        7 => "Protocol error",
        8 => "Provisioning failed",
        9 => "Operation cancelled",
        10 => "Port not found",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in ExitCodes::ALL {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);
        assert_eq!(success.message(), None);

        let error = CliResult::provision_failed("receiver not provisioned");
        assert!(!error.is_success());
        assert_eq!(error.code(), ExitCodes::PROVISION_FAILED);
        assert_eq!(error.message(), Some("receiver not provisioned"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "busy");
        assert_eq!(CliResult::from(err).code(), ExitCodes::PERMISSION_DENIED);
    }

    #[test]
    fn test_from_link_errors() {
        assert_eq!(CliResult::from(FrameError::Timeout).code(), ExitCodes::TIMEOUT);
        assert_eq!(
            CliResult::from(FrameError::ChecksumMismatch { expected: 1, actual: 2 }).code(),
            ExitCodes::PROTOCOL_ERROR
        );
        assert_eq!(
            CliResult::from(FrameError::Transport(TransportError::PortNotFound("COM9".into()))).code(),
            ExitCodes::PORT_NOT_FOUND
        );
        assert_eq!(CliResult::from(ConfigError::NoConfigDir).code(), ExitCodes::CONFIG_ERROR);
    }

    #[test]
    fn test_every_code_is_described() {
        for code in ExitCodes::ALL {
            assert_ne!(exit_code_description(code), "Unknown error");
        }
        assert_eq!(exit_code_description(200), "Unknown error");
    }
}
