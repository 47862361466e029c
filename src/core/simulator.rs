//! Simulated receiver
//!
//! An in-memory receiver that speaks the binary protocol. It only answers
//! when the host line runs at the receiver's current baud rate, keeps the
//! configuration it was sent, and records every frame the host wrote.
//! Faults (silence, NACKs, wrong acknowledgments, corrupted checksums, line
//! noise) can be scripted for tests and demos.

use crate::core::protocol::{
    baud_for_code, Frame, FrameDecoder, Message, MessageId, MessageType, NavigationData, NavigationMode,
    NmeaIntervals, SoftwareVersion,
};
use crate::core::provision::SUPPORTED_UPDATE_RATES;
use crate::core::transport::{GpsSerial, LineSettings, TransportError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::trace;

/// Baud rate after power-up or factory reset
pub const FACTORY_BAUD: u32 = 9600;
/// Update rate after power-up or factory reset
pub const FACTORY_UPDATE_RATE: u8 = 1;

/// A frame the host wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Host line baud rate when the frame was written
    pub baud: u32,
    /// Decoded command
    pub message: Message,
}

/// Receiver state that commands change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Serial baud rate
    pub baud: u32,
    /// Position update rate in Hz
    pub update_rate: u8,
    /// Output message type
    pub message_type: MessageType,
    /// NMEA sentence intervals
    pub nmea: NmeaIntervals,
    /// Navigation data interval
    pub navigation_interval: u8,
    /// Dynamics model
    pub navigation_mode: NavigationMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud: FACTORY_BAUD,
            update_rate: FACTORY_UPDATE_RATE,
            message_type: MessageType::Nmea,
            nmea: NmeaIntervals {
                gga: 1,
                gsa: 1,
                gsv: 1,
                rmc: 1,
                ..NmeaIntervals::disabled()
            },
            navigation_interval: 0,
            navigation_mode: NavigationMode::Automobile,
        }
    }
}

/// Scriptable in-memory receiver
#[derive(Debug)]
pub struct SimulatedReceiver {
    config: DeviceConfig,
    version: SoftwareVersion,
    host_line: LineSettings,
    silent: bool,
    rejected: HashSet<MessageId>,
    misacknowledged: HashSet<MessageId>,
    corrupt_responses: usize,
    rx: VecDeque<u8>,
    decoder: FrameDecoder,
    navigation: VecDeque<NavigationData>,
    sent: Vec<SentFrame>,
    line_changes: Vec<LineSettings>,
    flushes: usize,
    factory_resets: usize,
}

impl Default for SimulatedReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedReceiver {
    /// Receiver in factory state
    pub fn new() -> Self {
        Self {
            config: DeviceConfig::default(),
            version: SoftwareVersion {
                software_type: 1,
                kernel: 0x0001_0203,
                odm: 0x0001_0001,
                revision: 0x0018_0506,
            },
            host_line: LineSettings::default(),
            silent: false,
            rejected: HashSet::new(),
            misacknowledged: HashSet::new(),
            corrupt_responses: 0,
            rx: VecDeque::new(),
            decoder: FrameDecoder::new(),
            navigation: VecDeque::new(),
            sent: Vec::new(),
            line_changes: Vec::new(),
            flushes: 0,
            factory_resets: 0,
        }
    }

    /// Start at another baud rate
    pub fn at_baud(mut self, baud: u32) -> Self {
        self.config.baud = baud;
        self
    }

    /// Start at another update rate
    pub fn with_update_rate(mut self, rate: u8) -> Self {
        self.config.update_rate = rate;
        self
    }

    /// Never answer anything
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Answer `id` with a NACK
    pub fn reject(mut self, id: MessageId) -> Self {
        self.rejected.insert(id);
        self
    }

    /// Answer `id` with an ACK naming a different command
    pub fn misacknowledge(mut self, id: MessageId) -> Self {
        self.misacknowledged.insert(id);
        self
    }

    /// Corrupt the checksum of the next `count` responses
    pub fn corrupt_next(mut self, count: usize) -> Self {
        self.corrupt_responses = count;
        self
    }

    /// Toggle silence at runtime
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Stop rejecting `id`
    pub fn accept(&mut self, id: MessageId) {
        self.rejected.remove(&id);
        self.misacknowledged.remove(&id);
    }

    /// Push raw bytes onto the line
    pub fn inject_noise(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Queue a navigation message, delivered when the host next reads
    pub fn queue_navigation(&mut self, nav: NavigationData) {
        self.navigation.push_back(nav);
    }

    /// Current receiver configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Current host line settings
    pub fn host_line(&self) -> LineSettings {
        self.host_line
    }

    /// Every frame the host wrote, in order
    pub fn sent(&self) -> &[SentFrame] {
        &self.sent
    }

    /// Ids of every frame the host wrote, in order
    pub fn sent_ids(&self) -> Vec<MessageId> {
        self.sent.iter().map(|frame| frame.message.id()).collect()
    }

    /// Number of frames with `id` the host wrote
    pub fn count_sent(&self, id: MessageId) -> usize {
        self.sent.iter().filter(|frame| frame.message.id() == id).count()
    }

    /// Line settings the host applied, in order
    pub fn line_changes(&self) -> &[LineSettings] {
        &self.line_changes
    }

    /// Times the host discarded input
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Factory resets performed
    pub fn factory_resets(&self) -> usize {
        self.factory_resets
    }

    /// Check if the receiver can hear the host
    fn listening(&self) -> bool {
        !self.silent && self.host_line.baud_rate == self.config.baud
    }

    fn reply(&mut self, message: Message) {
        let mut bytes = Frame::from_message(&message).encode();
        if self.corrupt_responses > 0 {
            self.corrupt_responses -= 1;
            let checksum = bytes.len() - 3;
            bytes[checksum] ^= 0xFF;
        }
        trace!(frame = %hex::encode(&bytes), "simulated reply");
        self.rx.extend(bytes);
    }

    fn ack(&mut self, id: MessageId) {
        self.reply(Message::Ack { acked_id: id.as_u8() });
    }

    fn nack(&mut self, id: MessageId) {
        self.reply(Message::Nack { nacked_id: id.as_u8() });
    }

    fn handle(&mut self, message: Message) {
        let id = message.id();
        if self.rejected.contains(&id) {
            self.nack(id);
            return;
        }
        if self.misacknowledged.contains(&id) {
            self.reply(Message::Ack {
                acked_id: id.as_u8().wrapping_add(1),
            });
            return;
        }

        match message {
            Message::QuerySoftwareVersion { .. } => self.reply(Message::SoftwareVersion(self.version)),
            Message::QueryPositionUpdateRate => self.reply(Message::PositionUpdateRate {
                rate: self.config.update_rate,
            }),
            Message::SetFactoryDefaults { .. } => {
                self.ack(id);
                self.factory_resets += 1;
                self.config = DeviceConfig::default();
            }
            Message::ConfigureSerialPort { baud_code, .. } => match baud_for_code(baud_code) {
                Some(baud) => {
                    self.ack(id);
                    self.config.baud = baud;
                }
                None => self.nack(id),
            },
            Message::ConfigureNmeaMessage { intervals, .. } => {
                self.config.nmea = intervals;
                self.ack(id);
            }
            Message::ConfigureMessageType { kind, .. } => {
                self.config.message_type = kind;
                self.ack(id);
            }
            Message::ConfigurePositionUpdateRate { rate, .. } => {
                if SUPPORTED_UPDATE_RATES.contains(&rate) {
                    self.config.update_rate = rate;
                    self.ack(id);
                } else {
                    self.nack(id);
                }
            }
            Message::ConfigureNavigationDataInterval { interval, .. } => {
                self.config.navigation_interval = interval;
                self.ack(id);
            }
            Message::ConfigureNavigationMode { mode, .. } => {
                self.config.navigation_mode = mode;
                self.ack(id);
            }
            // output messages, a receiver never takes these as input
            Message::SoftwareVersion(_)
            | Message::Ack { .. }
            | Message::Nack { .. }
            | Message::PositionUpdateRate { .. }
            | Message::NavigationData(_) => {}
        }
    }
}

#[async_trait]
impl GpsSerial for SimulatedReceiver {
    async fn put_c(&mut self, byte: u8) -> Result<(), TransportError> {
        for frame in self.decoder.push(&[byte]) {
            let Ok(message) = frame.message() else {
                continue;
            };
            self.sent.push(SentFrame {
                baud: self.host_line.baud_rate,
                message: message.clone(),
            });
            if self.listening() {
                self.handle(message);
            }
        }
        Ok(())
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        if self.rx.is_empty() && self.listening() {
            if let Some(nav) = self.navigation.pop_front() {
                self.reply(Message::NavigationData(nav));
            }
        }
        match self.rx.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.rx.clear();
        self.flushes += 1;
        Ok(())
    }

    async fn configure(&mut self, settings: LineSettings) -> Result<(), TransportError> {
        self.host_line = settings;
        self.line_changes.push(settings);
        Ok(())
    }

    fn connection_info(&self) -> String {
        format!("simulated receiver @ {}", self.host_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{receive_frame, send_message, Attribute, ReceiveOptions};

    async fn exchange(sim: &mut SimulatedReceiver, message: Message, expected: &[MessageId]) -> Option<Message> {
        send_message(sim, &message).await.unwrap();
        receive_frame(sim, expected, &ReceiveOptions::default())
            .await
            .ok()
            .and_then(|frame| frame.message().ok())
    }

    #[tokio::test(start_paused = true)]
    async fn test_answers_only_at_device_baud() {
        let mut sim = SimulatedReceiver::new();
        sim.configure(LineSettings::eight_n_one(921_600)).await.unwrap();
        let reply = exchange(&mut sim, Message::query_software_version(), &[MessageId::SoftwareVersion]).await;
        assert!(reply.is_none());

        sim.configure(LineSettings::eight_n_one(9600)).await.unwrap();
        let reply = exchange(&mut sim, Message::query_software_version(), &[MessageId::SoftwareVersion]).await;
        assert!(matches!(reply, Some(Message::SoftwareVersion(_))));

        assert_eq!(sim.sent().len(), 2);
        assert_eq!(sim.sent()[0].baud, 921_600);
        assert_eq!(sim.sent()[1].baud, 9600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_port_command_switches_baud() {
        let mut sim = SimulatedReceiver::new();
        let reply = exchange(
            &mut sim,
            Message::configure_serial_port(8, Attribute::VolatileAndNonVolatile),
            &[MessageId::Ack],
        )
        .await;
        assert_eq!(reply, Some(Message::Ack { acked_id: 0x05 }));
        assert_eq!(sim.config().baud, 921_600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_unsupported_update_rate() {
        let mut sim = SimulatedReceiver::new();
        let reply = exchange(
            &mut sim,
            Message::configure_update_rate(3, Attribute::VolatileAndNonVolatile),
            &[MessageId::Ack, MessageId::Nack],
        )
        .await;
        assert_eq!(reply, Some(Message::Nack { nacked_id: 0x0E }));
        assert_eq!(sim.config().update_rate, FACTORY_UPDATE_RATE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_factory_reset_restores_defaults() {
        let mut sim = SimulatedReceiver::new().with_update_rate(10);
        let reply = exchange(&mut sim, Message::set_factory_defaults(), &[MessageId::Ack]).await;
        assert_eq!(reply, Some(Message::Ack { acked_id: 0x04 }));
        assert_eq!(sim.factory_resets(), 1);
        assert_eq!(sim.config().update_rate, FACTORY_UPDATE_RATE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_reply_is_never_accepted() {
        let mut sim = SimulatedReceiver::new().corrupt_next(1);
        let reply = exchange(&mut sim, Message::query_update_rate(), &[MessageId::PositionUpdateRate]).await;
        assert!(reply.is_none());

        let reply = exchange(&mut sim, Message::query_update_rate(), &[MessageId::PositionUpdateRate]).await;
        assert_eq!(reply, Some(Message::PositionUpdateRate { rate: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_receiver_times_out() {
        let mut sim = SimulatedReceiver::new().silent();
        let started = tokio::time::Instant::now();
        let byte = sim.read_byte(Duration::from_millis(250)).await.unwrap();
        assert!(byte.is_none());
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_discards_pending_input() {
        let mut sim = SimulatedReceiver::new();
        sim.inject_noise(&[1, 2, 3]);
        sim.flush().await.unwrap();
        assert!(sim.read_byte(Duration::from_millis(10)).await.unwrap().is_none());
        assert_eq!(sim.flushes(), 1);
    }
}
