//! BLE scanner firmware library.
//!
//! Exposes the scan core and its adapters for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; every other target gets simulation stubs.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod ble;
pub mod config;
pub mod error;

pub use error::{Error, Result};
