//! Advertisement classifier.
//!
//! Runs on the radio task once per received advertisement.  Each event is
//! either dropped or turned into exactly one [`AdvertisedDeviceRecord`]
//! that is handed to the [`DeviceRegistry`] by value.
//!
//! Only public addresses are kept: private/random addresses rotate, so the
//! same peer would show up as a new device every few minutes.
//!
//! Missing fields never drop a record.  No name becomes an empty name,
//! missing manufacturer data becomes [`ManufacturerId::UNKNOWN`].

use core::fmt;

use log::debug;

use crate::ble::{AddressKind, BATTERY_SERVICE_UUID, BleAddress, BleUuid};

use super::ports::{AdvertisementCallbacks, DeviceRegistry};

/// Longest name kept in a record (bytes).
pub const MAX_NAME_LEN: usize = 32;

// ───────────────────────────────────────────────────────────────
// Input
// ───────────────────────────────────────────────────────────────

/// One advertisement as delivered by the radio adapter.
///
/// Borrowed from the stack's event buffer; valid only for the duration of
/// the callback.
#[derive(Debug, Clone, Copy)]
pub struct RawAdvertisement<'a> {
    pub address: BleAddress,
    pub address_kind: AddressKind,
    pub name: Option<&'a str>,
    pub service_uuids: &'a [BleUuid],
    /// Manufacturer-specific data, company id first.
    pub manufacturer_data: Option<&'a [u8]>,
    pub rssi: i16,
}

// ───────────────────────────────────────────────────────────────
// Output
// ───────────────────────────────────────────────────────────────

/// Bluetooth SIG company identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManufacturerId(pub u16);

impl ManufacturerId {
    /// Reserved value used when an advertisement carries no usable
    /// manufacturer data.
    pub const UNKNOWN: Self = Self(0xFFFF);

    /// First two bytes of the manufacturer data, little-endian as on the
    /// air.  Absent or 1-byte payloads give [`Self::UNKNOWN`].
    pub fn from_manufacturer_data(data: Option<&[u8]>) -> Self {
        match data {
            Some([lo, hi, ..]) => Self(u16::from_le_bytes([*lo, *hi])),
            _ => Self::UNKNOWN,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}

impl fmt::Display for ManufacturerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else {
            write!(f, "0x{:04x}", self.0)
        }
    }
}

/// One classified observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDeviceRecord {
    pub address: BleAddress,
    pub address_kind: AddressKind,
    /// Advertised name, empty if none, cut to [`MAX_NAME_LEN`] bytes.
    pub name: heapless::String<MAX_NAME_LEN>,
    pub manufacturer_id: ManufacturerId,
    pub rssi: i16,
    pub has_battery_service: bool,
}

// ───────────────────────────────────────────────────────────────
// Classification
// ───────────────────────────────────────────────────────────────

/// Turn one advertisement into a record, or `None` to drop it.
pub fn classify(adv: &RawAdvertisement<'_>) -> Option<AdvertisedDeviceRecord> {
    if adv.address_kind != AddressKind::Public {
        return None;
    }

    let has_battery_service = adv.service_uuids.iter().any(|u| *u == BATTERY_SERVICE_UUID);

    Some(AdvertisedDeviceRecord {
        address: adv.address,
        address_kind: adv.address_kind,
        name: truncated_name(adv.name.unwrap_or("")),
        manufacturer_id: ManufacturerId::from_manufacturer_data(adv.manufacturer_data),
        rssi: adv.rssi,
        has_battery_service,
    })
}

/// Copy as many whole characters as fit.
fn truncated_name(name: &str) -> heapless::String<MAX_NAME_LEN> {
    let mut out = heapless::String::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Callback sink registered with the scan: classifies and forwards.
pub struct AdvertisementClassifier<G: DeviceRegistry> {
    registry: G,
}

impl<G: DeviceRegistry> AdvertisementClassifier<G> {
    pub fn new(registry: G) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &G {
        &self.registry
    }
}

impl<G: DeviceRegistry> AdvertisementCallbacks for AdvertisementClassifier<G> {
    fn on_result(&mut self, adv: &RawAdvertisement<'_>) {
        debug!(
            "BLE: advertised device {} kind={:?} rssi={}",
            adv.address, adv.address_kind, adv.rssi
        );
        if let Some(record) = classify(adv) {
            self.registry.add(record);
        }
    }
}
