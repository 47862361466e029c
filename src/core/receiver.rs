//! Receiver facade
//!
//! Owns the serial transport and exposes the two entry points a logger needs:
//! one-shot provisioning and blocking fix reads.

use crate::core::protocol::{FrameError, NavigationMode, ReceiveOptions};
use crate::core::provision::{ProvisionReport, Provisioner, RetryPolicy};
use crate::core::reader::{read_fix, FixSample};
use crate::core::transport::GpsSerial;
use tracing::info;

/// Link parameters used during provisioning and runtime reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSettings {
    /// Baud rate the receiver is switched to
    pub target_baud: u32,
    /// Dynamics model
    pub navigation_mode: NavigationMode,
    /// Navigation data message interval, in position updates
    pub navigation_interval: u8,
    /// Frame receive timeouts
    pub receive: ReceiveOptions,
    /// Outer retry policy
    pub retry: RetryPolicy,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            target_baud: 921_600,
            navigation_mode: NavigationMode::default(),
            navigation_interval: 1,
            receive: ReceiveOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// GNSS receiver on a serial transport
pub struct GnssReceiver<T: GpsSerial> {
    transport: T,
    settings: LinkSettings,
    report: Option<ProvisionReport>,
}

impl<T: GpsSerial> GnssReceiver<T> {
    /// Create a receiver with default link settings
    pub fn new(transport: T) -> Self {
        Self::with_settings(transport, LinkSettings::default())
    }

    /// Create a receiver with explicit link settings
    pub fn with_settings(transport: T, settings: LinkSettings) -> Self {
        Self {
            transport,
            settings,
            report: None,
        }
    }

    /// Link settings
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Configure the receiver for a logging sample rate.
    ///
    /// Returns `true` once every step was acknowledged, `false` after the
    /// attempt budget is spent. Details are kept in [`Self::provision_report`].
    pub async fn provision(&mut self, sample_rate_hz: u32) -> bool {
        info!(
            transport = %self.transport.connection_info(),
            sample_rate_hz,
            "provisioning receiver"
        );
        let report = Provisioner::new(&mut self.transport, &self.settings, sample_rate_hz)
            .run()
            .await;
        let provisioned = report.provisioned;
        self.report = Some(report);
        provisioned
    }

    /// Outcome of the last provisioning run
    pub fn provision_report(&self) -> Option<&ProvisionReport> {
        self.report.as_ref()
    }

    /// Check if the last provisioning run succeeded
    pub fn is_provisioned(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.provisioned)
    }

    /// Wait for the next navigation message
    pub async fn get_update(&mut self) -> Result<FixSample, FrameError> {
        read_fix(&mut self.transport, &self.settings.receive).await
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutable
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}
