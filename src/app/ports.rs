//! Port traits: the hexagonal boundary between the scan core and the radio.
//!
//! ```text
//!   Bluedroid adapter ──▶ Port trait ──▶ ScanOrchestrator / BatteryProbe
//!   radio callback    ──▶ AdvertisementCallbacks ──▶ DeviceRegistry
//! ```
//!
//! Driven adapters (radio, GATT client, clock, registry, phase table)
//! implement these traits.  The core consumes them via generics, so none
//! of it touches the BLE stack directly and every test instance gets its
//! own independent radio.

use crate::ble::{BleAddress, BleUuid};

use super::classifier::{AdvertisedDeviceRecord, RawAdvertisement};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic seconds source.
pub trait ClockPort {
    fn now_secs(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Radio / scan ports (driven adapter: domain → BLE stack)
// ───────────────────────────────────────────────────────────────

/// Process-wide radio subsystem.
pub trait RadioPort {
    type Scan: ScanPort;

    /// Whether the controller and host stack are already up.
    fn is_initialized(&self) -> bool;

    /// Bring up the controller and host stack, advertising `device_name`.
    fn init(&mut self, device_name: &str) -> Result<(), RadioError>;

    /// Hand out the scan handle.  Returns `None` if the stack cannot scan
    /// or the handle was already taken.
    fn take_scan(&mut self) -> Option<Self::Scan>;
}

/// One scan session handle.
pub trait ScanPort {
    /// Register the advertisement sink.  Ownership moves into the radio
    /// layer; it is invoked from the stack's task for every result until
    /// replaced by another call.
    fn set_callbacks(&mut self, callbacks: Box<dyn AdvertisementCallbacks>);

    /// Active scans request a scan response from every advertiser.
    fn set_active(&mut self, active: bool);

    fn set_interval_ms(&mut self, interval_ms: u16);

    /// Must not exceed the interval.
    fn set_window_ms(&mut self, window_ms: u16);

    /// Request a scan of `duration_secs`.  Returns as soon as the stack has
    /// accepted (or refused) the request; results arrive via callbacks.
    fn start(&mut self, duration_secs: u32, restart: bool) -> Result<(), RadioError>;

    /// Stop any scan in progress.  Harmless when idle.
    fn stop(&mut self);

    /// Drop results buffered inside the radio layer.
    fn clear_results(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Callback sinks (radio task → domain → registry)
// ───────────────────────────────────────────────────────────────

/// Receives every advertisement seen while a scan is running.
///
/// Called on the radio stack's task, concurrently with the application
/// loop.  Implementations must not block.
pub trait AdvertisementCallbacks: Send {
    fn on_result(&mut self, advertisement: &RawAdvertisement<'_>);
}

/// Ingestion side of the device registry (presence tracking lives there).
pub trait DeviceRegistry: Send {
    fn add(&mut self, record: AdvertisedDeviceRecord);
}

// ───────────────────────────────────────────────────────────────
// State-timeout table (owned by the outer scheduler)
// ───────────────────────────────────────────────────────────────

/// Phases of the outer scan/pause cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    Scanning,
    Pausing,
}

/// The outer state machine's timeout table.
pub trait StateTimeoutPort {
    fn modify_timeout(&mut self, phase: ScanPhase, timeout_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// GATT client ports (driven adapter: domain → peer)
// ───────────────────────────────────────────────────────────────

/// Factory for client-role connection handles.
pub trait GattCentral {
    type Client: GattClient;

    fn create_client(&mut self) -> Self::Client;
}

/// One client-role connection.
///
/// `Service` and `Characteristic` are opaque handles meaningful only to the
/// client that produced them.
pub trait GattClient {
    type Service;
    type Characteristic;

    fn connect(&mut self, address: &BleAddress) -> Result<(), GattError>;

    fn service(&mut self, uuid: BleUuid) -> Result<Self::Service, GattError>;

    fn characteristic(
        &mut self,
        service: &Self::Service,
        uuid: BleUuid,
    ) -> Result<Self::Characteristic, GattError>;

    fn can_read(&self, characteristic: &Self::Characteristic) -> bool;

    fn read_u8(&mut self, characteristic: &Self::Characteristic) -> Result<u8, GattError>;

    /// Tear down the link.  Harmless when not connected.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`RadioPort`] / [`ScanPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Controller or host stack bring-up failed at the named step.
    InitFailed(&'static str),
    /// No scan handle could be obtained.
    ScanUnavailable,
    /// The stack refused the scan request (ESP-IDF error code).
    StartRejected(i32),
}

/// Errors from [`GattClient`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattError {
    /// Link could not be established.
    ConnectFailed,
    /// Operation needs a link that is not (or no longer) up.
    NotConnected,
    /// Service discovery found no matching service.
    ServiceNotFound,
    /// No matching characteristic inside the service.
    CharacteristicNotFound,
    /// The read request failed or returned no data.
    ReadFailed,
    /// The stack did not answer in time.
    Timeout,
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InitFailed(step) => write!(f, "radio init failed at {}", step),
            Self::ScanUnavailable => write!(f, "scan handle unavailable"),
            Self::StartRejected(code) => write!(f, "scan start rejected ({})", code),
        }
    }
}

impl core::fmt::Display for GattError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::ServiceNotFound => write!(f, "service not found"),
            Self::CharacteristicNotFound => write!(f, "characteristic not found"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::Timeout => write!(f, "stack timeout"),
        }
    }
}
