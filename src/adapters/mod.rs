//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements               | Connects to              |
//! |---------------|--------------------------|--------------------------|
//! | `bluedroid`   | RadioPort, ScanPort      | Bluedroid GAP observer   |
//! |               | GattCentral, GattClient  | Bluedroid GATT client    |
//! | `config_store`| n/a                      | NVS flash (postcard)     |
//! | `device_id`   | n/a                      | eFuse factory MAC        |
//! | `phase_table` | StateTimeoutPort         | Main loop phase timing   |
//! | `registry`    | DeviceRegistry           | Serial log output        |
//! | `time`        | ClockPort                | ESP32 system timer       |

pub mod bluedroid;
pub mod config_store;
pub mod device_id;
pub mod phase_table;
pub mod registry;
pub mod time;
