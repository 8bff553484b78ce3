//! Mock radio, clock, registry and GATT adapters for integration tests.
//!
//! Every mock records its calls so tests can assert on the full command
//! history without a BLE stack.  Handles are cheap clones sharing one
//! state cell: hand one to the code under test, keep one to inspect.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use blescanner::app::classifier::{AdvertisedDeviceRecord, RawAdvertisement};
use blescanner::app::ports::{
    AdvertisementCallbacks, ClockPort, DeviceRegistry, GattCentral, GattClient, GattError,
    RadioError, RadioPort, ScanPhase, ScanPort, StateTimeoutPort,
};
use blescanner::ble::{BleAddress, BleUuid};

// ── Scan call record ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ScanCall {
    SetCallbacks,
    SetActive(bool),
    SetInterval(u16),
    SetWindow(u16),
    Start { duration_secs: u32, restart: bool },
    Stop,
    ClearResults,
}

// ── MockRadio ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RadioState {
    pub initialized: bool,
    pub init_calls: u32,
    pub init_name: String,
    pub take_scan_calls: u32,
    pub fail_init: bool,
    pub no_scan: bool,
    pub reject_start: bool,
    pub calls: Vec<ScanCall>,
    pub callbacks: Option<Box<dyn AdvertisementCallbacks>>,
}

#[derive(Clone, Default)]
pub struct MockRadio(pub Rc<RefCell<RadioState>>);

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(f: impl FnOnce(&mut RadioState)) -> Self {
        let radio = Self::new();
        f(&mut radio.0.borrow_mut());
        radio
    }

    pub fn calls(&self) -> Vec<ScanCall> {
        self.0.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.borrow_mut().calls.clear();
    }

    /// Last `SetActive` value sent to the scan.
    pub fn last_active(&self) -> Option<bool> {
        self.0.borrow().calls.iter().rev().find_map(|c| match c {
            ScanCall::SetActive(a) => Some(*a),
            _ => None,
        })
    }

    /// Play an advertisement into the registered callbacks, as the radio
    /// task would.
    pub fn deliver(&self, adv: &RawAdvertisement<'_>) {
        let mut state = self.0.borrow_mut();
        if let Some(cb) = state.callbacks.as_mut() {
            cb.on_result(adv);
        }
    }
}

pub struct MockScan(Rc<RefCell<RadioState>>);

impl RadioPort for MockRadio {
    type Scan = MockScan;

    fn is_initialized(&self) -> bool {
        self.0.borrow().initialized
    }

    fn init(&mut self, device_name: &str) -> Result<(), RadioError> {
        let mut s = self.0.borrow_mut();
        s.init_calls += 1;
        s.init_name = device_name.to_string();
        if s.fail_init {
            return Err(RadioError::InitFailed("mock"));
        }
        s.initialized = true;
        Ok(())
    }

    fn take_scan(&mut self) -> Option<MockScan> {
        let mut s = self.0.borrow_mut();
        s.take_scan_calls += 1;
        if s.no_scan {
            None
        } else {
            Some(MockScan(self.0.clone()))
        }
    }
}

impl ScanPort for MockScan {
    fn set_callbacks(&mut self, callbacks: Box<dyn AdvertisementCallbacks>) {
        let mut s = self.0.borrow_mut();
        s.calls.push(ScanCall::SetCallbacks);
        s.callbacks = Some(callbacks);
    }

    fn set_active(&mut self, active: bool) {
        self.0.borrow_mut().calls.push(ScanCall::SetActive(active));
    }

    fn set_interval_ms(&mut self, interval_ms: u16) {
        self.0.borrow_mut().calls.push(ScanCall::SetInterval(interval_ms));
    }

    fn set_window_ms(&mut self, window_ms: u16) {
        self.0.borrow_mut().calls.push(ScanCall::SetWindow(window_ms));
    }

    fn start(&mut self, duration_secs: u32, restart: bool) -> Result<(), RadioError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(ScanCall::Start {
            duration_secs,
            restart,
        });
        if s.reject_start {
            Err(RadioError::StartRejected(-1))
        } else {
            Ok(())
        }
    }

    fn stop(&mut self) {
        self.0.borrow_mut().calls.push(ScanCall::Stop);
    }

    fn clear_results(&mut self) {
        self.0.borrow_mut().calls.push(ScanCall::ClearResults);
    }
}

// ── FakeClock ─────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeClock(Rc<Cell<u64>>);

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secs: u64) {
        self.0.set(secs);
    }
}

impl ClockPort for FakeClock {
    fn now_secs(&self) -> u64 {
        self.0.get()
    }
}

// ── Timeout table ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTimeouts(pub Vec<(ScanPhase, u32)>);

impl StateTimeoutPort for RecordingTimeouts {
    fn modify_timeout(&mut self, phase: ScanPhase, timeout_ms: u32) {
        self.0.push((phase, timeout_ms));
    }
}

// ── Registry ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SharedRegistry(pub Arc<Mutex<Vec<AdvertisedDeviceRecord>>>);

#[allow(dead_code)]
impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AdvertisedDeviceRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl DeviceRegistry for SharedRegistry {
    fn add(&mut self, record: AdvertisedDeviceRecord) {
        self.0.lock().unwrap().push(record);
    }
}

// ── MockGatt ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GattCall {
    Connect(BleAddress),
    Service(BleUuid),
    Characteristic(BleUuid),
    Read,
    Disconnect,
}

pub struct GattScript {
    pub fail_connect: bool,
    pub fail_service: bool,
    pub fail_characteristic: bool,
    pub readable: bool,
    pub read: Result<u8, GattError>,
    pub clients_created: u32,
    pub calls: Vec<GattCall>,
}

impl Default for GattScript {
    fn default() -> Self {
        Self {
            fail_connect: false,
            fail_service: false,
            fail_characteristic: false,
            readable: true,
            read: Ok(100),
            clients_created: 0,
            calls: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockGatt(pub Rc<RefCell<GattScript>>);

#[allow(dead_code)]
impl MockGatt {
    pub fn with(f: impl FnOnce(&mut GattScript)) -> Self {
        let gatt = Self::default();
        f(&mut gatt.0.borrow_mut());
        gatt
    }

    pub fn calls(&self) -> Vec<GattCall> {
        self.0.borrow().calls.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| **c == GattCall::Disconnect)
            .count()
    }
}

pub struct MockClient(Rc<RefCell<GattScript>>);

impl GattCentral for MockGatt {
    type Client = MockClient;

    fn create_client(&mut self) -> MockClient {
        self.0.borrow_mut().clients_created += 1;
        MockClient(self.0.clone())
    }
}

impl GattClient for MockClient {
    type Service = BleUuid;
    type Characteristic = BleUuid;

    fn connect(&mut self, address: &BleAddress) -> Result<(), GattError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(GattCall::Connect(*address));
        if s.fail_connect {
            Err(GattError::ConnectFailed)
        } else {
            Ok(())
        }
    }

    fn service(&mut self, uuid: BleUuid) -> Result<BleUuid, GattError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(GattCall::Service(uuid));
        if s.fail_service {
            Err(GattError::ServiceNotFound)
        } else {
            Ok(uuid)
        }
    }

    fn characteristic(&mut self, _service: &BleUuid, uuid: BleUuid) -> Result<BleUuid, GattError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(GattCall::Characteristic(uuid));
        if s.fail_characteristic {
            Err(GattError::CharacteristicNotFound)
        } else {
            Ok(uuid)
        }
    }

    fn can_read(&self, _characteristic: &BleUuid) -> bool {
        self.0.borrow().readable
    }

    fn read_u8(&mut self, _characteristic: &BleUuid) -> Result<u8, GattError> {
        let mut s = self.0.borrow_mut();
        s.calls.push(GattCall::Read);
        s.read
    }

    fn disconnect(&mut self) {
        self.0.borrow_mut().calls.push(GattCall::Disconnect);
    }
}
