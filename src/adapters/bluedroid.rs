//! Bluedroid radio adapter.
//!
//! Implements [`RadioPort`] / [`ScanPort`] (GAP observer role) and
//! [`GattCentral`] / [`GattClient`] (GATT client role) on top of the
//! ESP-IDF Bluedroid host.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw Bluedroid FFI via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stubs for host-side tests.  The
//!   radio comes up, scans are logged, and every connect fails (there is no
//!   peer to talk to).
//!
//! ## Callback bridging
//!
//! Bluedroid callbacks are C function pointers that cannot capture Rust
//! closures.  Scan results are routed through [`SCAN_CALLBACKS`]; GATTC
//! events are forwarded over a channel to the one client currently
//! waiting on them.
//!
//! ```text
//!   GAP task ──▶ gap_event_handler ──▶ dispatch_scan_result ──▶ SCAN_CALLBACKS
//!   GATTC task ─▶ gattc_event_handler ─▶ GATTC_EVENTS (mpsc) ──▶ BluedroidClient
//! ```

use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::app::classifier::RawAdvertisement;
use crate::app::ports::{
    AdvertisementCallbacks, GattCentral, GattClient, GattError, RadioError, RadioPort, ScanPort,
};
use crate::ble::{AddressKind, BleAddress, BleUuid, adv_data};

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

/// GAP scan timing unit (µs).
const SCAN_UNIT_US: u32 = 625;

/// Controller limits for scan interval/window (in units of 0.625 ms).
const SCAN_UNITS_MIN: u16 = 0x0004;
const SCAN_UNITS_MAX: u16 = 0x4000;

/// `esp_ble_addr_type_t` values as reported in scan results.
const ADDR_TYPE_PUBLIC: u32 = 0;
const ADDR_TYPE_RANDOM: u32 = 1;
const ADDR_TYPE_RPA_RANDOM: u32 = 3;

/// Characteristic property bit: readable.
pub const CHAR_PROP_READ: u8 = 0x02;

/// `esp_gatt_status_t::ESP_GATT_OK`.
const GATT_STATUS_OK: u32 = 0;

#[cfg(target_os = "espidf")]
const GATTC_APP_ID: u16 = 0x55;

/// Upper bound on how long a client waits for one GATTC event.
#[cfg(target_os = "espidf")]
const GATTC_EVENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ───────────────────────────────────────────────────────────────
// Conversion helpers
// ───────────────────────────────────────────────────────────────

/// Milliseconds to GAP scan units, clamped to what the controller accepts.
pub fn ms_to_scan_units(ms: u16) -> u16 {
    let units = u32::from(ms) * 1000 / SCAN_UNIT_US;
    units.clamp(u32::from(SCAN_UNITS_MIN), u32::from(SCAN_UNITS_MAX)) as u16
}

/// Map Bluedroid's address type to the scan core's notion of it.
pub fn address_kind(ble_addr_type: u32) -> AddressKind {
    match ble_addr_type {
        ADDR_TYPE_PUBLIC => AddressKind::Public,
        ADDR_TYPE_RANDOM | ADDR_TYPE_RPA_RANDOM => AddressKind::Random,
        _ => AddressKind::Other,
    }
}

// ───────────────────────────────────────────────────────────────
// Scan result routing
// ───────────────────────────────────────────────────────────────

/// Sink for scan results.  Owned here for the process lifetime once
/// registered; replaced by a later registration.
static SCAN_CALLBACKS: Mutex<Option<Box<dyn AdvertisementCallbacks>>> = Mutex::new(None);

fn install_callbacks(callbacks: Box<dyn AdvertisementCallbacks>) {
    *SCAN_CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner) = Some(callbacks);
}

/// Decode one scan result and hand it to the registered callbacks.
///
/// `adv` and `scan_rsp` are parsed separately: padding at the end of the
/// advertising data must not hide the scan response.
pub fn dispatch_scan_result(
    address: BleAddress,
    ble_addr_type: u32,
    rssi: i16,
    adv: &[u8],
    scan_rsp: &[u8],
) {
    let mut data = adv_data::parse(adv);
    adv_data::parse_into(&mut data, scan_rsp);

    let raw = RawAdvertisement {
        address,
        address_kind: address_kind(ble_addr_type),
        name: data.name.as_deref(),
        service_uuids: &data.service_uuids,
        manufacturer_data: data.manufacturer_data,
        rssi,
    };

    // A callback that panicked earlier must not silence the ones
    // registered after it.
    let mut slot = SCAN_CALLBACKS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(cb) = slot.as_mut() {
        cb.on_result(&raw);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF static state and event handlers
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static GATTC_IF: AtomicU32 = AtomicU32::new(esp_idf_svc::sys::ESP_GATT_IF_NONE as u32);
#[cfg(target_os = "espidf")]
static SCANNING: AtomicBool = AtomicBool::new(false);
/// Duration of the scan to start once the parameters are accepted.
#[cfg(target_os = "espidf")]
static PENDING_SCAN_SECS: AtomicU32 = AtomicU32::new(0);

/// GATTC events forwarded to the waiting client.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
enum GattcEvent {
    Opened { status: u32, conn_id: u16 },
    ServiceFound { start_handle: u16, end_handle: u16 },
    SearchDone { status: u32 },
    Read { status: u32, value: Option<u8> },
    Closed,
}

#[cfg(target_os = "espidf")]
static GATTC_EVENTS: Mutex<Option<std::sync::mpsc::SyncSender<GattcEvent>>> = Mutex::new(None);

/// Returns `false` when no client is listening any more.
#[cfg(target_os = "espidf")]
fn forward_gattc(event: GattcEvent) -> bool {
    let slot = GATTC_EVENTS.lock().unwrap_or_else(PoisonError::into_inner);
    slot.as_ref().is_some_and(|tx| tx.try_send(event).is_ok())
}

#[cfg(target_os = "espidf")]
fn uuid_to_esp(uuid: BleUuid) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    match uuid {
        BleUuid::Uuid16(v) => {
            t.len = 2;
            t.uuid.uuid16 = v;
        }
        BleUuid::Uuid32(v) => {
            t.len = 4;
            t.uuid.uuid32 = v;
        }
        BleUuid::Uuid128(v) => {
            t.len = 16;
            t.uuid.uuid128 = v.to_le_bytes();
        }
    }
    t
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_PARAM_SET_COMPLETE_EVT => {
            let status = unsafe { (*param).scan_param_cmpl.status };
            if status != esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                warn!("BLE GAP: scan params rejected (status={})", status);
                return;
            }
            let secs = PENDING_SCAN_SECS.load(AtomicOrdering::Relaxed);
            let ret = unsafe { esp_ble_gap_start_scanning(secs) };
            if ret != ESP_OK as i32 {
                warn!("BLE GAP: start_scanning failed ({})", ret);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_START_COMPLETE_EVT => {
            let status = unsafe { (*param).scan_start_cmpl.status };
            if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                SCANNING.store(true, AtomicOrdering::Relaxed);
                debug!("BLE GAP: scan started");
            } else {
                warn!("BLE GAP: scan start failed (status={})", status);
            }
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_STOP_COMPLETE_EVT => {
            SCANNING.store(false, AtomicOrdering::Relaxed);
            debug!("BLE GAP: scan stopped");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RESULT_EVT => {
            let p = unsafe { &(*param).scan_rst };
            match p.search_evt {
                esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_RES_EVT => {
                    let adv_len = p.adv_data_len as usize;
                    let rsp_len = p.scan_rsp_len as usize;
                    let Some(raw) = p.ble_adv.get(..adv_len + rsp_len) else {
                        return;
                    };
                    let (adv, rsp) = raw.split_at(adv_len);
                    dispatch_scan_result(
                        BleAddress(p.bda),
                        p.ble_addr_type as u32,
                        p.rssi as i16,
                        adv,
                        rsp,
                    );
                }
                esp_gap_search_evt_t_ESP_GAP_SEARCH_INQ_CMPL_EVT => {
                    SCANNING.store(false, AtomicOrdering::Relaxed);
                    debug!("BLE GAP: scan duration complete");
                }
                _ => {}
            }
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gattc_event_handler(
    event: esp_idf_svc::sys::esp_gattc_cb_event_t,
    gattc_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gattc_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gattc_cb_event_t_ESP_GATTC_REG_EVT => {
            let status = unsafe { (*param).reg.status };
            if status == esp_gatt_status_t_ESP_GATT_OK {
                GATTC_IF.store(gattc_if as u32, AtomicOrdering::Relaxed);
                info!("BLE GATTC: app registered (if={})", gattc_if);
            } else {
                warn!("BLE GATTC: app register failed (status={})", status);
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_OPEN_EVT => {
            let p = unsafe { &(*param).open };
            let delivered = forward_gattc(GattcEvent::Opened {
                status: p.status as u32,
                conn_id: p.conn_id,
            });
            // The client gave up on this open; nobody would ever close it.
            if !delivered && p.status == esp_gatt_status_t_ESP_GATT_OK {
                warn!("BLE GATTC: late connection {} abandoned, closing", p.conn_id);
                unsafe { esp_ble_gattc_close(gattc_if, p.conn_id) };
            }
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_RES_EVT => {
            let p = unsafe { &(*param).search_res };
            let _ = forward_gattc(GattcEvent::ServiceFound {
                start_handle: p.start_handle,
                end_handle: p.end_handle,
            });
        }
        esp_gattc_cb_event_t_ESP_GATTC_SEARCH_CMPL_EVT => {
            let p = unsafe { &(*param).search_cmpl };
            let _ = forward_gattc(GattcEvent::SearchDone {
                status: p.status as u32,
            });
        }
        esp_gattc_cb_event_t_ESP_GATTC_READ_CHAR_EVT => {
            let p = unsafe { &(*param).read };
            let value = if p.value.is_null() || p.value_len == 0 {
                None
            } else {
                Some(unsafe { *p.value })
            };
            let _ = forward_gattc(GattcEvent::Read {
                status: p.status as u32,
                value,
            });
        }
        esp_gattc_cb_event_t_ESP_GATTC_CLOSE_EVT
        | esp_gattc_cb_event_t_ESP_GATTC_DISCONNECT_EVT => {
            let _ = forward_gattc(GattcEvent::Closed);
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Radio
// ───────────────────────────────────────────────────────────────

/// Process-wide Bluedroid host.  Hands out a single scan handle.
pub struct BluedroidRadio {
    initialized: bool,
    scan_taken: bool,
}

impl Default for BluedroidRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl BluedroidRadio {
    pub fn new() -> Self {
        Self {
            initialized: false,
            scan_taken: false,
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self, device_name: &str) -> Result<(), RadioError> {
        use esp_idf_svc::sys::*;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            if esp_bt_controller_init(&mut bt_cfg) != ESP_OK as i32 {
                return Err(RadioError::InitFailed("bt_controller_init"));
            }
            if esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE) != ESP_OK as i32 {
                return Err(RadioError::InitFailed("bt_controller_enable"));
            }
            if esp_bluedroid_init() != ESP_OK as i32 {
                return Err(RadioError::InitFailed("bluedroid_init"));
            }
            if esp_bluedroid_enable() != ESP_OK as i32 {
                return Err(RadioError::InitFailed("bluedroid_enable"));
            }

            if esp_ble_gap_register_callback(Some(gap_event_handler)) != ESP_OK as i32 {
                return Err(RadioError::InitFailed("gap_register_callback"));
            }
            if esp_ble_gattc_register_callback(Some(gattc_event_handler)) != ESP_OK as i32 {
                return Err(RadioError::InitFailed("gattc_register_callback"));
            }
            if esp_ble_gattc_app_register(GATTC_APP_ID) != ESP_OK as i32 {
                return Err(RadioError::InitFailed("gattc_app_register"));
            }

            let name = std::ffi::CString::new(device_name)
                .map_err(|_| RadioError::InitFailed("device name"))?;
            esp_ble_gap_set_device_name(name.as_ptr());
        }
        info!("BLE(espidf): Bluedroid stack initialized as '{}'", device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self, device_name: &str) -> Result<(), RadioError> {
        info!("BLE(sim): radio up as '{}'", device_name);
        Ok(())
    }
}

impl RadioPort for BluedroidRadio {
    type Scan = BluedroidScan;

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn init(&mut self, device_name: &str) -> Result<(), RadioError> {
        if self.initialized {
            return Ok(());
        }
        self.platform_init(device_name)?;
        self.initialized = true;
        Ok(())
    }

    fn take_scan(&mut self) -> Option<BluedroidScan> {
        if !self.initialized || self.scan_taken {
            return None;
        }
        self.scan_taken = true;
        Some(BluedroidScan::new())
    }
}

// ───────────────────────────────────────────────────────────────
// Scan
// ───────────────────────────────────────────────────────────────

/// The scan handle.  Parameters are staged locally and pushed to the
/// controller on [`start`](ScanPort::start).
pub struct BluedroidScan {
    active: bool,
    interval_units: u16,
    window_units: u16,
}

impl BluedroidScan {
    fn new() -> Self {
        Self {
            active: false,
            interval_units: ms_to_scan_units(100),
            window_units: ms_to_scan_units(100),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Interval and window as sent to the controller (0.625 ms units).
    pub fn timing_units(&self) -> (u16, u16) {
        (self.interval_units, self.window_units)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, duration_secs: u32, restart: bool) -> Result<(), RadioError> {
        use esp_idf_svc::sys::*;
        if SCANNING.load(AtomicOrdering::Relaxed) {
            if !restart {
                debug!("BLE: scan already running, not restarting");
                return Ok(());
            }
            unsafe { esp_ble_gap_stop_scanning() };
        }

        let mut params = esp_ble_scan_params_t {
            scan_type: if self.active {
                esp_ble_scan_type_t_BLE_SCAN_TYPE_ACTIVE
            } else {
                esp_ble_scan_type_t_BLE_SCAN_TYPE_PASSIVE
            },
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            scan_filter_policy: esp_ble_scan_filter_t_BLE_SCAN_FILTER_ALLOW_ALL,
            scan_interval: self.interval_units,
            scan_window: self.window_units,
            scan_duplicate: esp_ble_scan_duplicate_t_BLE_SCAN_DUPLICATE_DISABLE,
        };
        PENDING_SCAN_SECS.store(duration_secs, AtomicOrdering::Relaxed);
        // Scanning starts from the PARAM_SET_COMPLETE event.
        let ret = unsafe { esp_ble_gap_set_scan_params(&mut params) };
        if ret != ESP_OK as i32 {
            return Err(RadioError::StartRejected(ret));
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, duration_secs: u32, restart: bool) -> Result<(), RadioError> {
        info!(
            "BLE(sim): {} scan for {}s (interval={} window={}, restart={})",
            if self.active { "active" } else { "passive" },
            duration_secs,
            self.interval_units,
            self.window_units,
            restart
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        if SCANNING.load(AtomicOrdering::Relaxed) {
            unsafe { esp_idf_svc::sys::esp_ble_gap_stop_scanning() };
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): scan stopped");
    }
}

impl ScanPort for BluedroidScan {
    fn set_callbacks(&mut self, callbacks: Box<dyn AdvertisementCallbacks>) {
        install_callbacks(callbacks);
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn set_interval_ms(&mut self, interval_ms: u16) {
        self.interval_units = ms_to_scan_units(interval_ms);
    }

    fn set_window_ms(&mut self, window_ms: u16) {
        self.window_units = ms_to_scan_units(window_ms);
        if self.window_units > self.interval_units {
            warn!("BLE: scan window longer than interval, capped");
            self.window_units = self.interval_units;
        }
    }

    fn start(&mut self, duration_secs: u32, restart: bool) -> Result<(), RadioError> {
        self.platform_start(duration_secs, restart)
    }

    fn stop(&mut self) {
        self.platform_stop();
    }

    fn clear_results(&mut self) {
        // Bluedroid reports results one by one and keeps no list.
        debug!("BLE: no buffered scan results to clear");
    }
}

// ───────────────────────────────────────────────────────────────
// GATT client
// ───────────────────────────────────────────────────────────────

/// Hands out client connections.  Only one client is expected to be
/// in flight at a time; creating a new one detaches the previous one
/// from the event stream.
#[derive(Default)]
pub struct BluedroidCentral;

impl BluedroidCentral {
    pub fn new() -> Self {
        Self
    }
}

impl GattCentral for BluedroidCentral {
    type Client = BluedroidClient;

    #[cfg(target_os = "espidf")]
    fn create_client(&mut self) -> BluedroidClient {
        let (tx, rx) = std::sync::mpsc::sync_channel(8);
        *GATTC_EVENTS.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        BluedroidClient {
            link: Link::Idle,
            events: rx,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn create_client(&mut self) -> BluedroidClient {
        BluedroidClient { link: Link::Idle }
    }
}

/// Attribute handle range of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRange {
    pub start_handle: u16,
    pub end_handle: u16,
}

/// A discovered characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharHandle {
    pub handle: u16,
    pub properties: u8,
}

/// Client-side view of the link to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    /// Open accepted by the stack, no `Opened` event yet.
    Opening(BleAddress),
    Open { conn_id: u16 },
}

/// One client-role connection.
pub struct BluedroidClient {
    link: Link,
    #[cfg(target_os = "espidf")]
    events: std::sync::mpsc::Receiver<GattcEvent>,
}

impl BluedroidClient {
    fn conn_id(&self) -> Result<u16, GattError> {
        match self.link {
            Link::Open { conn_id } => Ok(conn_id),
            _ => Err(GattError::NotConnected),
        }
    }

    /// Track the link through stack events, whoever is waiting on them.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    fn observe(&mut self, event: GattcEvent) {
        match event {
            GattcEvent::Opened { status, conn_id } => {
                if let Link::Opening(_) = self.link {
                    self.link = if status == GATT_STATUS_OK {
                        Link::Open { conn_id }
                    } else {
                        Link::Idle
                    };
                }
            }
            GattcEvent::Closed => {
                if self.link != Link::Idle {
                    debug!("BLE GATTC: link dropped by the stack");
                }
                self.link = Link::Idle;
            }
            _ => {}
        }
    }

    /// Hand over whatever still needs tearing down and go idle.
    fn release(&mut self) -> Link {
        core::mem::replace(&mut self.link, Link::Idle)
    }
}

#[cfg(target_os = "espidf")]
impl BluedroidClient {
    fn gattc_if() -> Result<u8, GattError> {
        let gattc_if = GATTC_IF.load(AtomicOrdering::Relaxed);
        if gattc_if == esp_idf_svc::sys::ESP_GATT_IF_NONE as u32 {
            return Err(GattError::NotConnected);
        }
        Ok(gattc_if as u8)
    }

    /// Wait for the first event `pick` accepts, skipping unrelated ones.
    fn wait_for<T>(
        &mut self,
        mut pick: impl FnMut(GattcEvent) -> Option<T>,
    ) -> Result<T, GattError> {
        loop {
            let ev = self
                .events
                .recv_timeout(GATTC_EVENT_TIMEOUT)
                .map_err(|_| GattError::Timeout)?;
            self.observe(ev);
            if let Some(v) = pick(ev) {
                return Ok(v);
            }
        }
    }

    fn connected(&self) -> Result<(u8, u16), GattError> {
        let conn_id = self.conn_id()?;
        Ok((Self::gattc_if()?, conn_id))
    }
}

#[cfg(target_os = "espidf")]
impl GattClient for BluedroidClient {
    type Service = ServiceRange;
    type Characteristic = CharHandle;

    fn connect(&mut self, address: &BleAddress) -> Result<(), GattError> {
        use esp_idf_svc::sys::*;
        let gattc_if = Self::gattc_if()?;
        let mut bda = address.0;
        let ret = unsafe {
            esp_ble_gattc_open(
                gattc_if,
                bda.as_mut_ptr(),
                esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                true,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(GattError::ConnectFailed);
        }
        self.link = Link::Opening(*address);

        let opened = self.wait_for(|ev| match ev {
            GattcEvent::Opened { status, .. } => Some(status),
            GattcEvent::Closed => Some(u32::MAX),
            _ => None,
        });
        match opened {
            Ok(GATT_STATUS_OK) => Ok(()),
            Ok(_) => Err(GattError::ConnectFailed),
            Err(e) => {
                // The caller never sees a connection, so cancel it here.
                warn!("BLE GATTC: open of {} timed out, cancelling", address);
                self.disconnect();
                Err(e)
            }
        }
    }

    fn service(&mut self, uuid: BleUuid) -> Result<ServiceRange, GattError> {
        use esp_idf_svc::sys::*;
        let (gattc_if, conn_id) = self.connected()?;
        let mut filter = uuid_to_esp(uuid);
        if unsafe { esp_ble_gattc_search_service(gattc_if, conn_id, &mut filter) } != ESP_OK as i32
        {
            return Err(GattError::ServiceNotFound);
        }

        let mut found = None;
        let status = self.wait_for(|ev| match ev {
            GattcEvent::ServiceFound {
                start_handle,
                end_handle,
            } => {
                found.get_or_insert(ServiceRange {
                    start_handle,
                    end_handle,
                });
                None
            }
            GattcEvent::SearchDone { status } => Some(status),
            GattcEvent::Closed => Some(u32::MAX),
            _ => None,
        })?;
        if status != GATT_STATUS_OK {
            return Err(GattError::ServiceNotFound);
        }
        found.ok_or(GattError::ServiceNotFound)
    }

    fn characteristic(
        &mut self,
        service: &ServiceRange,
        uuid: BleUuid,
    ) -> Result<CharHandle, GattError> {
        use esp_idf_svc::sys::*;
        let (gattc_if, conn_id) = self.connected()?;
        let mut elem: esp_gattc_char_elem_t = unsafe { core::mem::zeroed() };
        let mut count: u16 = 1;
        let status = unsafe {
            esp_ble_gattc_get_char_by_uuid(
                gattc_if,
                conn_id,
                service.start_handle,
                service.end_handle,
                uuid_to_esp(uuid),
                &mut elem,
                &mut count,
            )
        };
        if status != esp_gatt_status_t_ESP_GATT_OK || count == 0 {
            return Err(GattError::CharacteristicNotFound);
        }
        Ok(CharHandle {
            handle: elem.char_handle,
            properties: elem.properties as u8,
        })
    }

    fn can_read(&self, characteristic: &CharHandle) -> bool {
        characteristic.properties & CHAR_PROP_READ != 0
    }

    fn read_u8(&mut self, characteristic: &CharHandle) -> Result<u8, GattError> {
        use esp_idf_svc::sys::*;
        let (gattc_if, conn_id) = self.connected()?;
        let ret = unsafe {
            esp_ble_gattc_read_char(
                gattc_if,
                conn_id,
                characteristic.handle,
                esp_gatt_auth_req_t_ESP_GATT_AUTH_REQ_NONE,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(GattError::ReadFailed);
        }
        let (status, value) = self.wait_for(|ev| match ev {
            GattcEvent::Read { status, value } => Some((status, value)),
            GattcEvent::Closed => Some((u32::MAX, None)),
            _ => None,
        })?;
        if status != GATT_STATUS_OK {
            return Err(GattError::ReadFailed);
        }
        value.ok_or(GattError::ReadFailed)
    }

    fn disconnect(&mut self) {
        use esp_idf_svc::sys::*;
        match self.release() {
            Link::Idle => {}
            Link::Opening(address) => {
                let mut bda = address.0;
                let ret = unsafe { esp_ble_gap_disconnect(bda.as_mut_ptr()) };
                debug!("BLE GATTC: pending open of {} cancelled ({})", address, ret);
            }
            Link::Open { conn_id } => {
                if let Ok(gattc_if) = Self::gattc_if() {
                    unsafe { esp_ble_gattc_close(gattc_if, conn_id) };
                    let _ = self.wait_for(|ev| matches!(ev, GattcEvent::Closed).then_some(()));
                }
                debug!("BLE GATTC: connection {} closed", conn_id);
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl GattClient for BluedroidClient {
    type Service = ServiceRange;
    type Characteristic = CharHandle;

    fn connect(&mut self, address: &BleAddress) -> Result<(), GattError> {
        info!("BLE(sim): connect {} (no peer)", address);
        Err(GattError::ConnectFailed)
    }

    fn service(&mut self, _uuid: BleUuid) -> Result<ServiceRange, GattError> {
        self.conn_id()?;
        Err(GattError::ServiceNotFound)
    }

    fn characteristic(
        &mut self,
        _service: &ServiceRange,
        _uuid: BleUuid,
    ) -> Result<CharHandle, GattError> {
        self.conn_id()?;
        Err(GattError::CharacteristicNotFound)
    }

    fn can_read(&self, characteristic: &CharHandle) -> bool {
        characteristic.properties & CHAR_PROP_READ != 0
    }

    fn read_u8(&mut self, _characteristic: &CharHandle) -> Result<u8, GattError> {
        self.conn_id()?;
        Err(GattError::ReadFailed)
    }

    fn disconnect(&mut self) {
        if self.release() != Link::Idle {
            info!("BLE(sim): disconnected");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
