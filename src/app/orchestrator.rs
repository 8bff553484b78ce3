//! Scan orchestrator: the scan lifecycle controller.
//!
//! [`ScanOrchestrator`] owns the radio, the scan handle and the
//! [`ScanSession`] timestamps.  The outer scheduler drives it:
//!
//! ```text
//!   setup() ──▶ ┌──────────┐ scan_start() ┌──────────┐
//!               │ Pausing  │ ───────────▶ │ Scanning │
//!               │          │ ◀─────────── │          │
//!               └──────────┘  scan_stop() └──────────┘
//! ```
//!
//! Each cycle is either **active** (scan requests sent, more radio time)
//! or **passive**.  A cycle is promoted to active only when
//! `activescan_timeout_secs` has elapsed since the previous active cycle,
//! which keeps scan-response data fresh without paying for it every time.

use log::{debug, error, info, warn};

use crate::config::BluetoothConfig;
use crate::error::Error;

use super::ports::{
    AdvertisementCallbacks, ClockPort, RadioPort, ScanPhase, ScanPort, StateTimeoutPort,
};

/// Scan interval.  The window is one tick narrower; an equal window would
/// leave the controller no slot to service other radio work.
pub const SCAN_INTERVAL_MS: u16 = 3000;
pub const SCAN_WINDOW_MS: u16 = SCAN_INTERVAL_MS - 1;

/// Name the radio advertises itself with when nobody supplies one.
pub const DEFAULT_DEVICE_NAME: &str = "BLE-Scanner";

/// Scan mode of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Active,
    Passive,
}

/// Orchestrator-owned scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSession {
    /// Start of the most recent cycle (seconds).
    pub last_scan_start: Option<u64>,
    /// Start of the most recent *active* cycle.  `None` until the first
    /// one, which makes the very first cycle active.
    pub last_active_scan_start: Option<u64>,
    /// Mode chosen for the most recent cycle.
    pub mode: ScanMode,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            last_scan_start: None,
            last_active_scan_start: None,
            mode: ScanMode::Passive,
        }
    }
}

impl ScanSession {
    /// Decide the mode for a cycle starting at `now` and record it.
    fn begin_cycle(&mut self, now: u64, activescan_timeout_secs: u32) -> ScanMode {
        let due = match self.last_active_scan_start {
            None => true,
            Some(last) => now.saturating_sub(last) > u64::from(activescan_timeout_secs),
        };
        self.mode = if due {
            self.last_active_scan_start = Some(now);
            ScanMode::Active
        } else {
            ScanMode::Passive
        };
        self.last_scan_start = Some(now);
        self.mode
    }
}

/// The scan lifecycle controller.
pub struct ScanOrchestrator<R: RadioPort, C: ClockPort> {
    radio: R,
    clock: C,
    scan: Option<R::Scan>,
    session: ScanSession,
    config: BluetoothConfig,
    device_name: heapless::String<24>,
}

impl<R: RadioPort, C: ClockPort> ScanOrchestrator<R, C> {
    /// Construct around a radio and a clock.  Nothing touches the radio
    /// until [`setup`](Self::setup).
    pub fn new(radio: R, clock: C) -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str(DEFAULT_DEVICE_NAME);
        Self {
            radio,
            clock,
            scan: None,
            session: ScanSession::default(),
            config: BluetoothConfig::default().sanitize(),
            device_name,
        }
    }

    /// Use `name` when the radio is brought up.
    pub fn with_device_name(mut self, name: &str) -> Self {
        self.device_name.clear();
        for c in name.chars() {
            if self.device_name.push(c).is_err() {
                break;
            }
        }
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Clamp the config, publish the phase timeouts, bring up the radio
    /// and register `callbacks` on the scan handle.
    ///
    /// Radio init and handle acquisition happen at most once per
    /// orchestrator; a repeated call only re-applies config and callbacks.
    /// On error the failure has already been logged and scanning stays
    /// disabled for the lifetime of this instance.
    pub fn setup(
        &mut self,
        config: &BluetoothConfig,
        timeouts: &mut impl StateTimeoutPort,
        callbacks: Box<dyn AdvertisementCallbacks>,
    ) -> Result<(), Error> {
        self.config = config.sanitize();
        if self.config != *config {
            warn!("BLE: config out of range, clamped to {:?}", self.config);
        }

        info!("BLE: setting up timeout values in the state table");
        timeouts.modify_timeout(ScanPhase::Scanning, self.config.scanning_phase_ms());
        timeouts.modify_timeout(ScanPhase::Pausing, self.config.pausing_phase_ms());

        if self.radio.is_initialized() {
            debug!("BLE: radio already initialised");
        } else {
            debug!("BLE: init as '{}'", self.device_name);
            if let Err(e) = self.radio.init(&self.device_name) {
                error!("BLE: radio init failed: {}", e);
                return Err(e.into());
            }
        }

        if self.scan.is_none() {
            debug!("BLE: create a scan");
            self.scan = self.radio.take_scan();
        }
        match self.scan.as_mut() {
            Some(scan) => {
                scan.set_callbacks(callbacks);
                Ok(())
            }
            None => {
                error!("BLE: no scan handle available, scanning disabled");
                Err(Error::Init("scan handle unavailable"))
            }
        }
    }

    // ── Per-cycle operations ──────────────────────────────────

    /// Start one scan cycle.  Returns `true` if the radio accepted the
    /// request.
    ///
    /// The session timestamps are updated even when the request is
    /// refused; there is no feedback channel for failures that happen
    /// later inside the controller anyway.
    pub fn scan_start(&mut self) -> bool {
        let Some(scan) = self.scan.as_mut() else {
            warn!("BLE: scan start requested without a scan handle");
            return false;
        };

        let now = self.clock.now_secs();
        let mode = self
            .session
            .begin_cycle(now, self.config.activescan_timeout_secs);

        scan.set_active(mode == ScanMode::Active);
        scan.set_interval_ms(SCAN_INTERVAL_MS);
        scan.set_window_ms(SCAN_WINDOW_MS);

        debug!(
            "BLE: start {} scan ({}s)",
            if mode == ScanMode::Active { "active" } else { "passive" },
            self.config.scan_time_secs
        );
        match scan.start(u32::from(self.config.scan_time_secs), false) {
            Ok(()) => true,
            Err(e) => {
                warn!("BLE: scan start failed: {}", e);
                false
            }
        }
    }

    /// Stop the current scan and drop the radio's buffered results.
    /// Safe to call at any time, any number of times.
    pub fn scan_stop(&mut self) -> bool {
        debug!("BLE: scan stop");
        if let Some(scan) = self.scan.as_mut() {
            scan.stop();
            scan.clear_results();
        }
        true
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// The clamped configuration in effect.
    pub fn config(&self) -> &BluetoothConfig {
        &self.config
    }

    /// Whether a scan handle was acquired.
    pub fn can_scan(&self) -> bool {
        self.scan.is_some()
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }
}
