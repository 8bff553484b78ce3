//! Scan orchestrator integration tests.
//!
//! Drive `setup` / `scan_start` / `scan_stop` against the recording mock
//! radio and a hand-stepped clock.

use blescanner::app::classifier::{AdvertisementClassifier, RawAdvertisement};
use blescanner::app::orchestrator::{SCAN_INTERVAL_MS, SCAN_WINDOW_MS, ScanMode, ScanOrchestrator};
use blescanner::app::ports::{RadioError, ScanPhase};
use blescanner::ble::{AddressKind, BleAddress};
use blescanner::config::BluetoothConfig;
use blescanner::error::Error;

use crate::mock_radio::{FakeClock, MockRadio, RecordingTimeouts, ScanCall, SharedRegistry};

fn orchestrator(radio: &MockRadio, clock: &FakeClock) -> ScanOrchestrator<MockRadio, FakeClock> {
    ScanOrchestrator::new(radio.clone(), clock.clone())
}

fn classifier() -> Box<AdvertisementClassifier<SharedRegistry>> {
    Box::new(AdvertisementClassifier::new(SharedRegistry::new()))
}

fn ready(config: &BluetoothConfig) -> (ScanOrchestrator<MockRadio, FakeClock>, MockRadio, FakeClock) {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let mut o = orchestrator(&radio, &clock);
    o.setup(config, &mut RecordingTimeouts::default(), classifier())
        .unwrap();
    radio.clear_calls();
    (o, radio, clock)
}

// ── setup ─────────────────────────────────────────────────────

#[test]
fn setup_pushes_phase_timeouts() {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let mut timeouts = RecordingTimeouts::default();
    let config = BluetoothConfig {
        scan_time_secs: 30,
        pause_time_secs: 30,
        ..BluetoothConfig::default()
    };

    orchestrator(&radio, &clock)
        .setup(&config, &mut timeouts, classifier())
        .unwrap();

    assert_eq!(
        timeouts.0,
        vec![(ScanPhase::Scanning, 35_000), (ScanPhase::Pausing, 30_000)]
    );
}

#[test]
fn setup_clamps_out_of_range_config() {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let mut timeouts = RecordingTimeouts::default();
    let config = BluetoothConfig {
        scan_time_secs: 1,
        pause_time_secs: 9999,
        activescan_timeout_secs: 100_000,
        ..BluetoothConfig::default()
    };

    let mut o = orchestrator(&radio, &clock);
    o.setup(&config, &mut timeouts, classifier()).unwrap();

    assert_eq!(o.config().scan_time_secs, 10);
    assert_eq!(o.config().pause_time_secs, 300);
    assert_eq!(o.config().activescan_timeout_secs, 3600);
    assert_eq!(
        timeouts.0,
        vec![(ScanPhase::Scanning, 15_000), (ScanPhase::Pausing, 300_000)]
    );
}

#[test]
fn setup_initializes_radio_and_acquires_scan_once() {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let mut o = orchestrator(&radio, &clock).with_device_name("blescanner-efcafe");
    let config = BluetoothConfig::default();

    o.setup(&config, &mut RecordingTimeouts::default(), classifier())
        .unwrap();
    o.setup(&config, &mut RecordingTimeouts::default(), classifier())
        .unwrap();

    let s = radio.0.borrow();
    assert_eq!(s.init_calls, 1);
    assert_eq!(s.init_name, "blescanner-efcafe");
    assert_eq!(s.take_scan_calls, 1);
    assert_eq!(
        s.calls,
        vec![ScanCall::SetCallbacks, ScanCall::SetCallbacks]
    );
}

#[test]
fn setup_skips_init_on_already_initialized_radio() {
    let radio = MockRadio::with(|s| s.initialized = true);
    let clock = FakeClock::new();
    let mut o = orchestrator(&radio, &clock);

    o.setup(
        &BluetoothConfig::default(),
        &mut RecordingTimeouts::default(),
        classifier(),
    )
    .unwrap();

    assert_eq!(radio.0.borrow().init_calls, 0);
    assert!(o.can_scan());
}

#[test]
fn missing_scan_handle_disables_scanning() {
    let radio = MockRadio::with(|s| s.no_scan = true);
    let clock = FakeClock::new();
    let mut timeouts = RecordingTimeouts::default();
    let mut o = orchestrator(&radio, &clock);

    let result = o.setup(&BluetoothConfig::default(), &mut timeouts, classifier());

    assert!(matches!(result, Err(Error::Init(_))));
    // Timeouts were still published before the failure.
    assert_eq!(timeouts.0.len(), 2);
    assert!(!o.can_scan());

    clock.set(100);
    assert!(!o.scan_start());
    assert_eq!(o.session().last_scan_start, None);
    assert_eq!(o.session().last_active_scan_start, None);
    assert!(o.scan_stop());
    assert!(radio.calls().is_empty());
}

#[test]
fn radio_init_failure_is_reported() {
    let radio = MockRadio::with(|s| s.fail_init = true);
    let clock = FakeClock::new();
    let mut o = orchestrator(&radio, &clock);

    let result = o.setup(
        &BluetoothConfig::default(),
        &mut RecordingTimeouts::default(),
        classifier(),
    );

    assert_eq!(result, Err(Error::Radio(RadioError::InitFailed("mock"))));
    assert_eq!(radio.0.borrow().take_scan_calls, 0);
    assert!(!o.scan_start());
}

// ── scan_start ────────────────────────────────────────────────

#[test]
fn active_passive_schedule() {
    let config = BluetoothConfig {
        activescan_timeout_secs: 600,
        ..BluetoothConfig::default()
    };
    let (mut o, radio, clock) = ready(&config);

    clock.set(0);
    assert!(o.scan_start());
    assert_eq!(radio.last_active(), Some(true));
    assert_eq!(o.session().mode, ScanMode::Active);

    clock.set(60);
    assert!(o.scan_start());
    assert_eq!(radio.last_active(), Some(false));
    assert_eq!(o.session().mode, ScanMode::Passive);
    assert_eq!(o.session().last_active_scan_start, Some(0));

    clock.set(700);
    assert!(o.scan_start());
    assert_eq!(radio.last_active(), Some(true));
    assert_eq!(o.session().last_active_scan_start, Some(700));
    assert_eq!(o.session().last_scan_start, Some(700));
}

#[test]
fn scan_start_programs_timing_and_duration() {
    let config = BluetoothConfig {
        scan_time_secs: 42,
        ..BluetoothConfig::default()
    };
    let (mut o, radio, clock) = ready(&config);
    clock.set(5);

    assert!(o.scan_start());

    assert_eq!(
        radio.calls(),
        vec![
            ScanCall::SetActive(true),
            ScanCall::SetInterval(SCAN_INTERVAL_MS),
            ScanCall::SetWindow(SCAN_WINDOW_MS),
            ScanCall::Start {
                duration_secs: 42,
                restart: false
            },
        ]
    );
    assert_eq!((SCAN_INTERVAL_MS, SCAN_WINDOW_MS), (3000, 2999));
}

#[test]
fn rejected_start_still_updates_session() {
    let (mut o, radio, clock) = ready(&BluetoothConfig::default());
    radio.0.borrow_mut().reject_start = true;
    clock.set(10);

    assert!(!o.scan_start());
    assert_eq!(o.session().last_scan_start, Some(10));
    assert_eq!(o.session().last_active_scan_start, Some(10));
}

// ── scan_stop ─────────────────────────────────────────────────

#[test]
fn scan_stop_is_idempotent() {
    let (mut o, radio, _clock) = ready(&BluetoothConfig::default());

    assert!(o.scan_stop());
    assert!(o.scan_stop());

    assert_eq!(
        radio.calls(),
        vec![
            ScanCall::Stop,
            ScanCall::ClearResults,
            ScanCall::Stop,
            ScanCall::ClearResults
        ]
    );
}

#[test]
fn scan_stop_before_setup_is_harmless() {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let mut o = orchestrator(&radio, &clock);
    assert!(o.scan_stop());
    assert!(radio.calls().is_empty());
}

// ── callbacks ─────────────────────────────────────────────────

#[test]
fn registered_classifier_receives_advertisements() {
    let radio = MockRadio::new();
    let clock = FakeClock::new();
    let registry = SharedRegistry::new();
    let mut o = orchestrator(&radio, &clock);
    o.setup(
        &BluetoothConfig::default(),
        &mut RecordingTimeouts::default(),
        Box::new(AdvertisementClassifier::new(registry.clone())),
    )
    .unwrap();

    let adv = RawAdvertisement {
        address: BleAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        address_kind: AddressKind::Public,
        name: Some("Keys"),
        service_uuids: &[],
        manufacturer_data: None,
        rssi: -80,
    };
    radio.deliver(&adv);
    radio.deliver(&RawAdvertisement {
        address_kind: AddressKind::Random,
        ..adv
    });

    let records = registry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name.as_str(), "Keys");
}
