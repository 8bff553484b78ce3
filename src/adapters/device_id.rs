//! Radio identity: the controller's own Bluetooth address and the device
//! name derived from it.
//!
//! The name is `blescanner-` plus the low three address bytes, so two
//! scanners on the same bench stay distinguishable in logs.

use core::fmt::Write;

use crate::ble::BleAddress;

/// Radio device name, `blescanner-xxyyzz` (17 chars).
pub type DeviceName = heapless::String<24>;

const NAME_PREFIX: &str = "blescanner-";

/// The Bluetooth MAC the controller advertises with.
#[cfg(target_os = "espidf")]
pub fn bluetooth_address() -> BleAddress {
    use esp_idf_svc::sys::*;
    let mut mac = [0u8; 6];
    let ret = unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT) };
    if ret != ESP_OK as i32 {
        log::warn!("BLE: reading the BT MAC failed ({})", ret);
    }
    BleAddress(mac)
}

#[cfg(not(target_os = "espidf"))]
pub fn bluetooth_address() -> BleAddress {
    BleAddress([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

pub fn device_name(address: &BleAddress) -> DeviceName {
    let mut name = DeviceName::new();
    let _ = name.push_str(NAME_PREFIX);
    for b in &address.0[3..] {
        let _ = write!(name, "{:02x}", b);
    }
    name
}
