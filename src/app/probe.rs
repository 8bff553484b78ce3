//! Battery probe: one-shot GATT read of a peer's battery level.
//!
//! ```text
//!   connect ─▶ Battery Service (0x180F) ─▶ Battery Level (0x2A19) ─▶ read
//!      │               │                          │                   │
//!      ✗ fail          ✗ fail                     ✗ fail              not readable → success, no level
//! ```
//!
//! Every path that got past `connect` disconnects exactly once.  The link
//! is owned by a guard that disconnects on drop, so early returns cannot
//! leak a connection slot.

use log::{debug, info, warn};

use crate::ble::{BATTERY_LEVEL_CHAR_UUID, BATTERY_SERVICE_UUID, BleAddress};

use super::ports::{GattCentral, GattClient};

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    /// Connection, service and characteristic lookup all succeeded.
    pub success: bool,
    /// Battery level as read, only when the characteristic was readable
    /// and the read returned a value.
    pub level: Option<u8>,
}

impl BatteryReading {
    pub const fn failed() -> Self {
        Self {
            success: false,
            level: None,
        }
    }

    pub const fn level(level: u8) -> Self {
        Self {
            success: true,
            level: Some(level),
        }
    }

    /// Peer exposes the characteristic but it could not be read.
    pub const fn unreadable() -> Self {
        Self {
            success: true,
            level: None,
        }
    }
}

/// Connected client that disconnects when it goes out of scope.
struct Connection<'a, C: GattClient> {
    client: &'a mut C,
}

impl<C: GattClient> Drop for Connection<'_, C> {
    fn drop(&mut self) {
        self.client.disconnect();
    }
}

/// Reads battery levels over short-lived client connections.
pub struct BatteryProbe<G: GattCentral> {
    central: G,
}

impl<G: GattCentral> BatteryProbe<G> {
    pub fn new(central: G) -> Self {
        Self { central }
    }

    pub fn central(&self) -> &G {
        &self.central
    }

    /// Connect to `address`, read the Battery Level characteristic and
    /// disconnect.  Blocks for the duration of the exchange.
    ///
    /// Values above 100 are returned as read.
    pub fn read_battery_level(&mut self, address: &BleAddress) -> BatteryReading {
        let mut client = self.central.create_client();

        debug!("BLE: connecting to {}", address);
        if let Err(e) = client.connect(address) {
            warn!("BLE: connect to {} failed: {}", address, e);
            return BatteryReading::failed();
        }
        let conn = Connection {
            client: &mut client,
        };

        let service = match conn.client.service(BATTERY_SERVICE_UUID) {
            Ok(s) => s,
            Err(e) => {
                warn!("BLE: {} battery service: {}", address, e);
                return BatteryReading::failed();
            }
        };

        let characteristic = match conn.client.characteristic(&service, BATTERY_LEVEL_CHAR_UUID) {
            Ok(c) => c,
            Err(e) => {
                warn!("BLE: {} battery level characteristic: {}", address, e);
                return BatteryReading::failed();
            }
        };

        if !conn.client.can_read(&characteristic) {
            info!("BLE: {} battery level not readable", address);
            return BatteryReading::unreadable();
        }

        match conn.client.read_u8(&characteristic) {
            Ok(level) => {
                info!("BLE: {} battery level {}%", address, level);
                BatteryReading::level(level)
            }
            Err(e) => {
                warn!("BLE: {} battery level read failed: {}", address, e);
                BatteryReading::unreadable()
            }
        }
    }
}
