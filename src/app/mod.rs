//! Application core: pure scan logic, zero I/O.
//!
//! The scan lifecycle, advertisement classification and the battery probe
//! live here.  All interaction with the BLE stack happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without a radio.

pub mod classifier;
pub mod orchestrator;
pub mod ports;
pub mod probe;
