//! Provisioning flows against the simulated receiver

use async_trait::async_trait;
use gnsslink_core::core::protocol::{Attribute, Message, MessageId, MessageType, NavigationMode, NmeaIntervals};
use gnsslink_core::core::provision::ProvisionState;
use gnsslink_core::core::simulator::SimulatedReceiver;
use gnsslink_core::core::transport::{GpsSerial, LineSettings, TransportError};
use gnsslink_core::{GnssReceiver, LinkSettings};
use std::time::Duration;

const ATTR: Attribute = Attribute::VolatileAndNonVolatile;

fn receiver(sim: SimulatedReceiver) -> GnssReceiver<SimulatedReceiver> {
    GnssReceiver::new(sim)
}

#[tokio::test(start_paused = true)]
async fn provisions_receiver_found_at_9600() {
    let mut rx = receiver(SimulatedReceiver::new());
    assert!(rx.provision(10).await);

    let sim = rx.transport();
    let sent = sim.sent();
    assert_eq!((sent[0].baud, &sent[0].message), (921_600, &Message::query_software_version()));
    assert_eq!((sent[1].baud, &sent[1].message), (9600, &Message::query_software_version()));
    assert_eq!(
        (sent[2].baud, &sent[2].message),
        (9600, &Message::configure_serial_port(8, ATTR))
    );

    let rest: Vec<&Message> = sent[3..].iter().map(|frame| &frame.message).collect();
    assert_eq!(
        rest,
        vec![
            &Message::query_update_rate(),
            &Message::configure_update_rate(10, ATTR),
            &Message::configure_nmea(NmeaIntervals::default_profile(), ATTR),
            &Message::configure_message_type(MessageType::Binary, ATTR),
            &Message::configure_navigation_interval(1, ATTR),
            &Message::configure_navigation_mode(NavigationMode::Automobile, ATTR),
            &Message::configure_nmea(NmeaIntervals::disabled(), ATTR),
        ]
    );
    assert!(sent[3..].iter().all(|frame| frame.baud == 921_600));

    let config = sim.config();
    assert_eq!(config.baud, 921_600);
    assert_eq!(config.update_rate, 10);
    assert_eq!(config.message_type, MessageType::Binary);
    assert_eq!(config.navigation_interval, 1);
    assert!(config.nmea.is_disabled());
    assert_eq!(sim.host_line().baud_rate, 921_600);

    let report = rx.provision_report().unwrap();
    assert!(report.provisioned);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.detected_baud, Some(9600));
    assert_eq!(report.previous_update_rate, Some(1));
    assert_eq!(report.update_rate, 10);
    assert!(!report.factory_reset_issued);
    assert!(report.receiver_version.is_some());
    assert_eq!(report.history.last().map(|t| t.to), Some(ProvisionState::Done));
}

#[tokio::test(start_paused = true)]
async fn skips_commands_already_in_effect() {
    let sim = SimulatedReceiver::new().at_baud(921_600).with_update_rate(25);
    let mut rx = receiver(sim);
    assert!(rx.provision(20).await);

    let ids = rx.transport().sent_ids();
    assert_eq!(
        ids,
        vec![
            MessageId::QuerySoftwareVersion,
            MessageId::QueryPositionUpdateRate,
            MessageId::ConfigureNmeaMessage,
            MessageId::ConfigureMessageType,
            MessageId::ConfigureNavigationDataInterval,
            MessageId::ConfigureNavigationMode,
            MessageId::ConfigureNmeaMessage,
        ]
    );
    assert_eq!(rx.provision_report().unwrap().detected_baud, Some(921_600));
}

#[tokio::test(start_paused = true)]
async fn unknown_update_rate_forces_reconfiguration() {
    let sim = SimulatedReceiver::new()
        .at_baud(921_600)
        .with_update_rate(10)
        .reject(MessageId::QueryPositionUpdateRate);
    let mut rx = receiver(sim);
    assert!(rx.provision(10).await);

    assert_eq!(rx.transport().count_sent(MessageId::ConfigurePositionUpdateRate), 1);
    assert_eq!(rx.provision_report().unwrap().previous_update_rate, None);
}

#[tokio::test(start_paused = true)]
async fn sample_rate_selects_update_rate() {
    for (sample_rate, expected) in [(30, 50), (15, 25), (8, 10), (3, 5), (1, 1)] {
        let mut rx = receiver(SimulatedReceiver::new());
        assert!(rx.provision(sample_rate).await);
        assert_eq!(rx.transport().config().update_rate, expected, "sample rate {sample_rate}");
    }
}

#[tokio::test(start_paused = true)]
async fn silent_receiver_fails_after_all_attempts() {
    let mut rx = receiver(SimulatedReceiver::new().silent());
    assert!(!rx.provision(10).await);

    let sim = rx.transport();
    assert_eq!(sim.count_sent(MessageId::QuerySoftwareVersion), 20);
    assert_eq!(sim.count_sent(MessageId::SetFactoryDefaults), 2);

    // reset happens once, after the fifth attempt, at each probe rate
    let resets: Vec<(usize, u32)> = sim
        .sent()
        .iter()
        .enumerate()
        .filter(|(_, frame)| frame.message.id() == MessageId::SetFactoryDefaults)
        .map(|(index, frame)| (index, frame.baud))
        .collect();
    assert_eq!(resets, vec![(10, 921_600), (11, 9600)]);

    let report = rx.provision_report().unwrap();
    assert!(!report.provisioned);
    assert_eq!(report.attempts, 10);
    assert!(report.factory_reset_issued);
    assert_eq!(report.detected_baud, None);
    assert_eq!(report.history.last().map(|t| t.to), Some(ProvisionState::Failed));
    assert!(!rx.is_provisioned());
}

#[tokio::test(start_paused = true)]
async fn rejected_step_fails_every_attempt() {
    let sim = SimulatedReceiver::new().reject(MessageId::ConfigureNavigationMode);
    let mut rx = receiver(sim);
    assert!(!rx.provision(10).await);

    let sim = rx.transport();
    assert_eq!(sim.count_sent(MessageId::ConfigureNavigationMode), 10);
    assert_eq!(sim.count_sent(MessageId::SetFactoryDefaults), 1);
    assert_eq!(sim.factory_resets(), 1);

    let report = rx.provision_report().unwrap();
    let reason = report.history.iter().rev().find_map(|t| t.reason.clone()).unwrap();
    assert!(reason.contains("rejected"), "{reason}");
}

#[tokio::test(start_paused = true)]
async fn acknowledgment_for_another_command_is_failure() {
    let sim = SimulatedReceiver::new()
        .at_baud(921_600)
        .misacknowledge(MessageId::ConfigureMessageType);
    let mut rx = receiver(sim);
    assert!(!rx.provision(10).await);

    let sim = rx.transport();
    assert_eq!(sim.count_sent(MessageId::ConfigureNavigationMode), 0);
    let reason = rx
        .provision_report()
        .unwrap()
        .history
        .iter()
        .rev()
        .find_map(|t| t.reason.clone())
        .unwrap();
    assert!(reason.contains("answered for id"), "{reason}");
}

#[tokio::test(start_paused = true)]
async fn corrupted_probe_reply_costs_one_attempt() {
    let mut rx = receiver(SimulatedReceiver::new().corrupt_next(1));
    assert!(rx.provision(10).await);

    let report = rx.provision_report().unwrap();
    assert_eq!(report.attempts, 2);
    assert_eq!(rx.transport().count_sent(MessageId::QuerySoftwareVersion), 4);
}

#[tokio::test(start_paused = true)]
async fn custom_link_settings_are_applied() {
    let settings = LinkSettings {
        navigation_mode: NavigationMode::Pedestrian,
        target_baud: 115_200,
        ..LinkSettings::default()
    };
    let mut rx = GnssReceiver::with_settings(SimulatedReceiver::new(), settings);
    assert!(rx.provision(1).await);

    let sim = rx.transport();
    assert_eq!(sim.config().navigation_mode, NavigationMode::Pedestrian);
    assert_eq!(sim.config().baud, 115_200);
    assert_eq!(sim.host_line().baud_rate, 115_200);
    assert_eq!(sim.count_sent(MessageId::ConfigurePositionUpdateRate), 0);
}

#[tokio::test(start_paused = true)]
async fn provisioned_receiver_is_found_at_target_baud_next_time() {
    let mut rx = receiver(SimulatedReceiver::new());
    assert!(rx.provision(10).await);

    let sim = rx.into_inner();
    let before = sim.sent().len();
    let mut rx = receiver(sim);
    assert!(rx.provision(10).await);

    let sent = &rx.transport().sent()[before..];
    assert_eq!(sent[0].baud, 921_600);
    assert_eq!(sent[0].message, Message::query_software_version());
    assert_eq!(rx.transport().count_sent(MessageId::ConfigureSerialPort), 1);
}

/// Host adapter that cannot run the line at one baud rate
struct LimitedAdapter {
    inner: SimulatedReceiver,
    unsupported: u32,
}

#[async_trait]
impl GpsSerial for LimitedAdapter {
    async fn put_c(&mut self, byte: u8) -> Result<(), TransportError> {
        self.inner.put_c(byte).await
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransportError> {
        self.inner.read_byte(timeout).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.inner.flush().await
    }

    async fn configure(&mut self, settings: LineSettings) -> Result<(), TransportError> {
        if settings.baud_rate == self.unsupported {
            return Err(TransportError::ConfigError(format!("{} baud not supported", settings.baud_rate)));
        }
        self.inner.configure(settings).await
    }

    fn connection_info(&self) -> String {
        self.inner.connection_info()
    }
}

#[tokio::test(start_paused = true)]
async fn baud_search_moves_on_when_line_rate_is_unavailable() {
    let adapter = LimitedAdapter {
        inner: SimulatedReceiver::new(),
        unsupported: 921_600,
    };
    let settings = LinkSettings {
        target_baud: 115_200,
        ..LinkSettings::default()
    };
    let mut rx = GnssReceiver::with_settings(adapter, settings);
    assert!(rx.provision(10).await);

    let report = rx.provision_report().unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.detected_baud, Some(9600));

    let sim = &rx.transport().inner;
    let probes: Vec<u32> = sim
        .sent()
        .iter()
        .filter(|frame| frame.message.id() == MessageId::QuerySoftwareVersion)
        .map(|frame| frame.baud)
        .collect();
    assert_eq!(probes, vec![9600]);
    assert_eq!(sim.config().baud, 115_200);
}
