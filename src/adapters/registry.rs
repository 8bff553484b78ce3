//! Log-based device registry adapter.
//!
//! Implements [`DeviceRegistry`] by writing every classified advertisement
//! to the logger (UART / USB-CDC in production).  Devices that advertise
//! the Battery Service are queued for the main loop, which decides with a
//! [`BatteryCheckGate`] whether a probe is due.
//!
//! ```text
//!   radio task ──▶ LogRegistry::add ──▶ log "SCAN | ..."
//!                          │
//!                          └─ has_battery_service ──▶ BatteryCandidates
//!                                                          │
//!   main loop  ◀── drain() ◀───────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::app::classifier::AdvertisedDeviceRecord;
use crate::app::ports::DeviceRegistry;
use crate::ble::BleAddress;

/// Addresses waiting for a battery probe.
pub const MAX_BATTERY_CANDIDATES: usize = 16;

/// Devices whose last probe time is remembered (power of two).
pub const MAX_TRACKED_DEVICES: usize = 32;

// ───────────────────────────────────────────────────────────────
// Candidate queue
// ───────────────────────────────────────────────────────────────

/// Shared FIFO of battery-capable addresses, written from the radio task.
#[derive(Clone, Default)]
pub struct BatteryCandidates {
    queue: Arc<Mutex<heapless::Deque<BleAddress, MAX_BATTERY_CANDIDATES>>>,
}

impl BatteryCandidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `address` unless it is already waiting.  Drops it when full;
    /// the device will be seen again on the next cycle.
    pub fn offer(&self, address: BleAddress) {
        let Ok(mut q) = self.queue.lock() else {
            return;
        };
        if q.iter().any(|a| *a == address) {
            return;
        }
        if q.push_back(address).is_err() {
            debug!("SCAN | battery queue full, dropping {}", address);
        }
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> heapless::Vec<BleAddress, MAX_BATTERY_CANDIDATES> {
        let mut out = heapless::Vec::new();
        if let Ok(mut q) = self.queue.lock() {
            while let Some(a) = q.pop_front() {
                let _ = out.push(a);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

/// Adapter that logs every [`AdvertisedDeviceRecord`] to the serial console.
pub struct LogRegistry {
    candidates: BatteryCandidates,
}

impl LogRegistry {
    pub fn new(candidates: BatteryCandidates) -> Self {
        Self { candidates }
    }
}

impl DeviceRegistry for LogRegistry {
    fn add(&mut self, record: AdvertisedDeviceRecord) {
        info!(
            "SCAN | {} | name='{}' | mfr={} | rssi={}dBm | batt={}",
            record.address,
            record.name,
            record.manufacturer_id,
            record.rssi,
            if record.has_battery_service { "yes" } else { "no" },
        );
        if record.has_battery_service {
            self.candidates.offer(record.address);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Battery check gate
// ───────────────────────────────────────────────────────────────

/// Rate-limits battery probes per device to one per `timeout_secs`.
pub struct BatteryCheckGate {
    timeout_secs: u32,
    last_checked: heapless::FnvIndexMap<BleAddress, u64, MAX_TRACKED_DEVICES>,
}

impl BatteryCheckGate {
    pub fn new(timeout_secs: u32) -> Self {
        Self {
            timeout_secs,
            last_checked: heapless::FnvIndexMap::new(),
        }
    }

    /// Whether `address` is due for a probe at `now`.  A `true` answer
    /// records `now` as the device's last check.
    pub fn should_check(&mut self, address: BleAddress, now: u64) -> bool {
        if let Some(&last) = self.last_checked.get(&address) {
            if now.saturating_sub(last) < u64::from(self.timeout_secs) {
                return false;
            }
        }

        if self.last_checked.insert(address, now).is_err() {
            self.evict_oldest();
            let _ = self.last_checked.insert(address, now);
        }
        true
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .last_checked
            .iter()
            .min_by_key(|(_, t)| **t)
            .map(|(a, _)| *a);
        if let Some(a) = oldest {
            self.last_checked.remove(&a);
        }
    }
}
