//! Unified error type for the scanner.
//!
//! Port-level errors ([`RadioError`], [`GattError`]) live next to their
//! traits; everything that leaves the core funnels into [`Error`].  All
//! variants are `Copy` so they can be logged and returned from callbacks
//! without allocation.

use core::fmt;

use crate::app::ports::{GattError, RadioError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Radio bring-up or scan handle acquisition failed.
    Init(&'static str),
    /// The radio stack rejected an operation.
    Radio(RadioError),
    /// A client-role GATT exchange failed.
    Gatt(GattError),
    /// Configuration is invalid or could not be decoded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Gatt(e) => write!(f, "gatt: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<GattError> for Error {
    fn from(e: GattError) -> Self {
        Self::Gatt(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
