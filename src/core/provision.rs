//! Receiver provisioning state machine
//!
//! Brings the receiver from an unknown configuration to the one the logger
//! needs: target baud rate, an update rate matching the sample rate, binary
//! navigation output and the configured dynamics model. Every step failure
//! aborts only the current attempt; the caller gets a yes/no answer.

use crate::core::protocol::{
    code_for_baud, receive_frame, send_message, Attribute, FrameError, Message, MessageId, MessageType,
    NmeaIntervals, PROBE_BAUD_RATES,
};
use crate::core::receiver::LinkSettings;
use crate::core::transport::{GpsSerial, LineSettings, TransportError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Every configuration command is stored so it survives a power cycle
const ATTRIBUTES: Attribute = Attribute::VolatileAndNonVolatile;

/// Update rates the receiver supports, in Hz
pub const SUPPORTED_UPDATE_RATES: [u8; 10] = [1, 2, 4, 5, 8, 10, 20, 25, 40, 50];

/// Pick the receiver update rate for a logging sample rate
pub fn target_update_rate(sample_rate_hz: u32) -> u8 {
    if sample_rate_hz > 25 {
        50
    } else if sample_rate_hz > 10 {
        25
    } else if sample_rate_hz > 5 {
        10
    } else if sample_rate_hz > 1 {
        5
    } else {
        1
    }
}

/// Provisioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionState {
    /// No attempt made yet
    Idle,
    /// Looking for the receiver on the known baud rates
    ProbeBaud,
    /// Switching the receiver to the target baud rate
    NegotiateBaud,
    /// Matching the update rate to the sample rate
    NegotiateUpdateRate,
    /// NMEA profile, binary mode and navigation message interval
    ConfigureContentMode,
    /// Dynamics model
    ConfigureNavMode,
    /// Turning text output off
    DisableTextMessages,
    /// Restoring factory defaults between attempts
    FactoryReset,
    /// Receiver provisioned
    Done,
    /// Current attempt failed
    Failed,
}

impl ProvisionState {
    /// Check if state ends provisioning
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if state is one of the attempt steps
    pub fn is_step(&self) -> bool {
        matches!(
            self,
            Self::ProbeBaud
                | Self::NegotiateBaud
                | Self::NegotiateUpdateRate
                | Self::ConfigureContentMode
                | Self::ConfigureNavMode
                | Self::DisableTextMessages
        )
    }

    /// Check if a transition is valid
    pub fn can_transition_to(&self, next: ProvisionState) -> bool {
        use ProvisionState::*;

        match (*self, next) {
            (Idle | Failed | FactoryReset, ProbeBaud) => true,
            (ProbeBaud, NegotiateBaud) => true,
            (NegotiateBaud, NegotiateUpdateRate) => true,
            (NegotiateUpdateRate, ConfigureContentMode) => true,
            (ConfigureContentMode, ConfigureNavMode) => true,
            (ConfigureNavMode, DisableTextMessages) => true,
            (DisableTextMessages, Done) => true,
            (Failed, FactoryReset) => true,
            (FactoryReset, Failed) => true,
            (step, Failed) => step.is_step(),
            _ => false,
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ProbeBaud => "probe baud",
            Self::NegotiateBaud => "negotiate baud",
            Self::NegotiateUpdateRate => "negotiate update rate",
            Self::ConfigureContentMode => "configure content mode",
            Self::ConfigureNavMode => "configure navigation mode",
            Self::DisableTextMessages => "disable text messages",
            Self::FactoryReset => "factory reset",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from: ProvisionState,
    /// New state
    pub to: ProvisionState,
    /// Attempt number (1-based, 0 before the first attempt)
    pub attempt: u32,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Reason for transition
    pub reason: Option<String>,
}

/// Outer retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum provisioning attempts
    pub max_attempts: u32,
    /// Wait before the first attempt so the receiver can boot
    pub startup_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            startup_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Check if another attempt is allowed
    pub fn should_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Factory reset is issued once, when half the attempts are left
    pub fn factory_reset_due(&self, attempts_made: u32) -> bool {
        self.max_attempts.saturating_sub(attempts_made) == self.max_attempts / 2
    }
}

/// Why a single command failed
#[derive(Error, Debug)]
pub enum CommandError {
    /// No acknowledgment arrived
    #[error("no response to {0}")]
    NoResponse(MessageId),

    /// Receiver answered with a NACK
    #[error("{0} rejected by receiver")]
    Rejected(MessageId),

    /// Acknowledgment refers to another command
    #[error("{command} answered for id 0x{acked:02X}")]
    Mismatch {
        /// Command that was sent
        command: MessageId,
        /// Id echoed by the receiver
        acked: u8,
    },

    /// Corrupted or malformed response
    #[error("bad response: {0}")]
    Frame(FrameError),

    /// Transport failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CommandError {
    fn from_frame(command: MessageId, err: FrameError) -> Self {
        match err {
            FrameError::Timeout => Self::NoResponse(command),
            FrameError::Transport(e) => Self::Transport(e),
            other => Self::Frame(other),
        }
    }
}

/// Why a provisioning attempt failed
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// No answer on any probed baud rate
    #[error("receiver not detected on known baud rates")]
    NotDetected,

    /// Target baud rate has no receiver code
    #[error("no receiver baud code for {0} baud")]
    UnsupportedBaud(u32),

    /// A step's command failed
    #[error("{state}: {source}")]
    Step {
        /// Step that failed
        state: ProvisionState,
        /// Underlying command failure
        source: CommandError,
    },

    /// Transport failure outside a command
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Outcome of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Receiver ready for runtime reads
    pub provisioned: bool,
    /// Attempts made
    pub attempts: u32,
    /// Baud rate the receiver answered on in the last attempt
    pub detected_baud: Option<u32>,
    /// Baud rate the link runs at
    pub target_baud: u32,
    /// Update rate reported before reconfiguration, if it could be read
    pub previous_update_rate: Option<u8>,
    /// Update rate requested for the sample rate
    pub update_rate: u8,
    /// Receiver software version, if probing succeeded
    pub receiver_version: Option<String>,
    /// Factory reset was issued
    pub factory_reset_issued: bool,
    /// State history
    pub history: Vec<StateTransition>,
}

/// State carried across one provisioning run
#[derive(Debug)]
struct ProvisionSession {
    state: ProvisionState,
    attempt: u32,
    detected_baud: Option<u32>,
    current_update_rate: Option<u8>,
    target_update_rate: u8,
    receiver_version: Option<String>,
    factory_reset_issued: bool,
    history: Vec<StateTransition>,
}

impl ProvisionSession {
    fn new(target_update_rate: u8) -> Self {
        Self {
            state: ProvisionState::Idle,
            attempt: 0,
            detected_baud: None,
            current_update_rate: None,
            target_update_rate,
            receiver_version: None,
            factory_reset_issued: false,
            history: Vec::new(),
        }
    }
}

/// Drives one provisioning run over a borrowed transport
pub struct Provisioner<'a, T: GpsSerial + ?Sized> {
    transport: &'a mut T,
    settings: &'a LinkSettings,
    session: ProvisionSession,
}

impl<'a, T: GpsSerial + ?Sized> Provisioner<'a, T> {
    /// Create a provisioner for a logging sample rate
    pub fn new(transport: &'a mut T, settings: &'a LinkSettings, sample_rate_hz: u32) -> Self {
        Self {
            transport,
            settings,
            session: ProvisionSession::new(target_update_rate(sample_rate_hz)),
        }
    }

    fn transition(&mut self, to: ProvisionState, reason: Option<String>) {
        let from = self.session.state;
        debug_assert!(from.can_transition_to(to), "invalid transition {from} -> {to}");
        debug!(%from, %to, attempt = self.session.attempt, "provisioning state");

        self.session.history.push(StateTransition {
            from,
            to,
            attempt: self.session.attempt,
            timestamp: Utc::now(),
            reason,
        });
        self.session.state = to;
    }

    /// Run attempts until provisioned or the attempt budget is spent
    pub async fn run(mut self) -> ProvisionReport {
        let policy = self.settings.retry;
        if !policy.startup_delay.is_zero() {
            tokio::time::sleep(policy.startup_delay).await;
        }

        while policy.should_attempt(self.session.attempt) && !self.session.state.is_terminal() {
            self.session.attempt += 1;
            info!(attempt = self.session.attempt, max = policy.max_attempts, "provisioning attempt");
            self.transition(ProvisionState::ProbeBaud, None);

            match self.attempt().await {
                Ok(()) => {
                    self.transition(ProvisionState::Done, None);
                    info!(attempt = self.session.attempt, "receiver provisioned");
                }
                Err(e) => {
                    warn!(attempt = self.session.attempt, error = %e, "provisioning attempt failed");
                    self.transition(ProvisionState::Failed, Some(e.to_string()));

                    if policy.factory_reset_due(self.session.attempt) {
                        self.factory_reset().await;
                    }
                }
            }
        }

        if self.session.state == ProvisionState::FactoryReset {
            self.transition(ProvisionState::Failed, Some("attempts exhausted".to_string()));
        }
        if !self.session.state.is_terminal() {
            error!(attempts = self.session.attempt, "receiver not provisioned");
        }

        self.report()
    }

    fn report(self) -> ProvisionReport {
        let session = self.session;
        ProvisionReport {
            provisioned: session.state.is_terminal(),
            attempts: session.attempt,
            detected_baud: session.detected_baud,
            target_baud: self.settings.target_baud,
            previous_update_rate: session.current_update_rate,
            update_rate: session.target_update_rate,
            receiver_version: session.receiver_version,
            factory_reset_issued: session.factory_reset_issued,
            history: session.history,
        }
    }

    async fn attempt(&mut self) -> Result<(), ProvisionError> {
        let detected = self.probe().await?.ok_or(ProvisionError::NotDetected)?;
        self.session.detected_baud = Some(detected);
        info!(baud = detected, "receiver detected");

        self.transition(ProvisionState::NegotiateBaud, None);
        let target = self.settings.target_baud;
        if detected != target {
            let code = code_for_baud(target).ok_or(ProvisionError::UnsupportedBaud(target))?;
            info!(from = detected, to = target, "configuring receiver baud rate");
            self.step(Message::configure_serial_port(code, ATTRIBUTES)).await?;
        }
        self.transport.configure(LineSettings::eight_n_one(target)).await?;
        self.transport.flush().await?;

        self.transition(ProvisionState::NegotiateUpdateRate, None);
        let target_rate = self.session.target_update_rate;
        let current_rate = self.query_update_rate().await?;
        self.session.current_update_rate = current_rate;
        if current_rate == Some(target_rate) {
            debug!(rate = target_rate, "update rate already configured");
        } else {
            info!(from = ?current_rate, to = target_rate, "configuring update rate");
            self.step(Message::configure_update_rate(target_rate, ATTRIBUTES)).await?;
        }

        self.transition(ProvisionState::ConfigureContentMode, None);
        self.step(Message::configure_nmea(NmeaIntervals::default_profile(), ATTRIBUTES))
            .await?;
        self.step(Message::configure_message_type(MessageType::Binary, ATTRIBUTES))
            .await?;
        self.step(Message::configure_navigation_interval(
            self.settings.navigation_interval,
            ATTRIBUTES,
        ))
        .await?;

        self.transition(ProvisionState::ConfigureNavMode, None);
        self.step(Message::configure_navigation_mode(self.settings.navigation_mode, ATTRIBUTES))
            .await?;

        self.transition(ProvisionState::DisableTextMessages, None);
        self.step(Message::configure_nmea(NmeaIntervals::disabled(), ATTRIBUTES))
            .await?;

        Ok(())
    }

    /// Try each table rate in order; first answer wins
    async fn probe(&mut self) -> Result<Option<u32>, ProvisionError> {
        for rate in PROBE_BAUD_RATES {
            info!(baud = rate.baud, "probing receiver");
            if let Err(e) = self.transport.configure(LineSettings::eight_n_one(rate.baud)).await {
                warn!(baud = rate.baud, error = %e, "could not reconfigure line");
                continue;
            }
            self.transport.flush().await?;
            send_message(&mut *self.transport, &Message::query_software_version()).await?;

            match receive_frame(&mut *self.transport, &[MessageId::SoftwareVersion], &self.settings.receive).await {
                Ok(frame) => {
                    if let Ok(Message::SoftwareVersion(version)) = frame.message() {
                        info!(%version, "receiver software version");
                        self.session.receiver_version = Some(version.to_string());
                    }
                    return Ok(Some(rate.baud));
                }
                Err(FrameError::Transport(e)) => return Err(e.into()),
                Err(e) => debug!(baud = rate.baud, error = %e, "no answer"),
            }
        }
        Ok(None)
    }

    /// `None` when the receiver does not answer
    async fn query_update_rate(&mut self) -> Result<Option<u8>, ProvisionError> {
        send_message(&mut *self.transport, &Message::query_update_rate()).await?;
        match receive_frame(&mut *self.transport, &[MessageId::PositionUpdateRate], &self.settings.receive).await {
            Ok(frame) => match frame.message() {
                Ok(Message::PositionUpdateRate { rate }) => Ok(Some(rate)),
                _ => Ok(None),
            },
            Err(FrameError::Transport(e)) => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "could not detect update rate");
                Ok(None)
            }
        }
    }

    async fn step(&mut self, message: Message) -> Result<(), ProvisionError> {
        self.command(&message).await.map_err(|source| ProvisionError::Step {
            state: self.session.state,
            source,
        })
    }

    /// Send a command and wait for its acknowledgment
    async fn command(&mut self, message: &Message) -> Result<(), CommandError> {
        let id = message.id();
        send_message(&mut *self.transport, message).await?;

        let frame = receive_frame(
            &mut *self.transport,
            &[MessageId::Ack, MessageId::Nack],
            &self.settings.receive,
        )
        .await
        .map_err(|e| CommandError::from_frame(id, e))?;

        let response = frame.message().map_err(|e| CommandError::Frame(e.into()))?;
        match response {
            Message::Ack { acked_id } if acked_id == id.as_u8() => {
                debug!(command = %id, "acknowledged");
                Ok(())
            }
            Message::Nack { nacked_id } if nacked_id == id.as_u8() => Err(CommandError::Rejected(id)),
            Message::Ack { acked_id: other } | Message::Nack { nacked_id: other } => Err(CommandError::Mismatch {
                command: id,
                acked: other,
            }),
            other => Err(CommandError::Mismatch {
                command: id,
                acked: other.id().as_u8(),
            }),
        }
    }

    /// Restore factory defaults, trying each table rate until acknowledged
    async fn factory_reset(&mut self) {
        self.transition(ProvisionState::FactoryReset, None);
        self.session.factory_reset_issued = true;

        for rate in PROBE_BAUD_RATES {
            info!(baud = rate.baud, "attempting factory defaults");
            let line = LineSettings::eight_n_one(rate.baud);
            if let Err(e) = self.transport.configure(line).await {
                warn!(baud = rate.baud, error = %e, "could not reconfigure line");
                continue;
            }
            if let Err(e) = self.transport.flush().await {
                warn!(error = %e, "could not flush line");
            }

            match self.command(&Message::set_factory_defaults()).await {
                Ok(()) => {
                    info!(baud = rate.baud, "factory defaults restored");
                    return;
                }
                Err(e) => debug!(baud = rate.baud, error = %e, "factory defaults not acknowledged"),
            }
        }
        warn!("factory reset not acknowledged on any baud rate");
    }
}
