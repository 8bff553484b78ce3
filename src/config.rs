//! Bluetooth scanning configuration
//!
//! All tunable parameters consumed by the scan core.
//! Every field is range-clamped by [`BluetoothConfig::sanitize`] before use,
//! so a corrupted or hand-edited config blob can never put the radio into
//! an out-of-range duty cycle.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// --- Bounds ---

pub const SCAN_TIME_MIN_SECS: u16 = 10;
pub const SCAN_TIME_MAX_SECS: u16 = 300;

pub const PAUSE_TIME_MIN_SECS: u16 = 0;
pub const PAUSE_TIME_MAX_SECS: u16 = 300;

pub const ACTIVESCAN_TIMEOUT_MIN_SECS: u32 = 0;
pub const ACTIVESCAN_TIMEOUT_MAX_SECS: u32 = 3600;

pub const ABSENCE_CYCLES_MIN: u8 = 1;
pub const ABSENCE_CYCLES_MAX: u8 = 60;

pub const PUBLISH_TIMEOUT_MIN_SECS: u32 = 10;
pub const PUBLISH_TIMEOUT_MAX_SECS: u32 = 3600;

pub const BATTCHECK_TIMEOUT_MIN_SECS: u32 = 60;
pub const BATTCHECK_TIMEOUT_MAX_SECS: u32 = 86_400;

/// Clamp `value` into `min..=max`.
///
/// Unlike [`Ord::clamp`] this never panics: a `min > max` pair (a bad
/// bounds table) resolves to `min`.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        if max < min { min } else { max }
    } else {
        value
    }
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    // --- Scan cycle ---
    /// Duration of each scan cycle (seconds)
    pub scan_time_secs: u16,
    /// Pause between scan cycles (seconds), timed by the outer scheduler
    pub pause_time_secs: u16,
    /// Minimum interval between active-mode scans (seconds)
    pub activescan_timeout_secs: u32,

    // --- Registry / publisher (passed through, clamped only) ---
    /// Cycles without observation before a device is reported absent
    pub absence_cycles: u8,
    /// Whether absent devices are published at all
    pub publish_absence: bool,
    /// Maximum interval between publications of an unchanged device (seconds)
    pub publish_timeout_secs: u32,

    // --- Battery probe ---
    /// Minimum interval between battery probes of one device (seconds)
    pub battcheck_timeout_secs: u32,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            scan_time_secs: 30,
            pause_time_secs: 30,
            activescan_timeout_secs: 600, // 10 min

            absence_cycles: 5,
            publish_absence: false,
            publish_timeout_secs: 300,

            battcheck_timeout_secs: 3600, // 1/h
        }
    }
}

impl BluetoothConfig {
    /// Return a copy with every field forced into its device bounds.
    pub fn sanitize(&self) -> Self {
        Self {
            scan_time_secs: clamp(self.scan_time_secs, SCAN_TIME_MIN_SECS, SCAN_TIME_MAX_SECS),
            pause_time_secs: clamp(self.pause_time_secs, PAUSE_TIME_MIN_SECS, PAUSE_TIME_MAX_SECS),
            activescan_timeout_secs: clamp(
                self.activescan_timeout_secs,
                ACTIVESCAN_TIMEOUT_MIN_SECS,
                ACTIVESCAN_TIMEOUT_MAX_SECS,
            ),
            absence_cycles: clamp(self.absence_cycles, ABSENCE_CYCLES_MIN, ABSENCE_CYCLES_MAX),
            publish_absence: self.publish_absence,
            publish_timeout_secs: clamp(
                self.publish_timeout_secs,
                PUBLISH_TIMEOUT_MIN_SECS,
                PUBLISH_TIMEOUT_MAX_SECS,
            ),
            battcheck_timeout_secs: clamp(
                self.battcheck_timeout_secs,
                BATTCHECK_TIMEOUT_MIN_SECS,
                BATTCHECK_TIMEOUT_MAX_SECS,
            ),
        }
    }

    /// Timeout for the scanning phase, with a 5 s grace so the radio's own
    /// scan timer always expires before the outer state machine moves on.
    pub fn scanning_phase_ms(&self) -> u32 {
        (u32::from(self.scan_time_secs) + 5) * 1000
    }

    /// Timeout for the pausing phase.
    pub fn pausing_phase_ms(&self) -> u32 {
        u32::from(self.pause_time_secs) * 1000
    }

    // --- Encoding ---

    /// Decode a JSON document.  Missing fields take their defaults; the
    /// result is not yet sanitized.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|_| Error::Config("malformed JSON"))
    }

    /// Compact binary form for flash storage.
    pub fn to_postcard(&self) -> Result<Vec<u8>, Error> {
        postcard::to_allocvec(self).map_err(|_| Error::Config("encode failed"))
    }

    pub fn from_postcard(bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(|_| Error::Config("malformed blob"))
    }
}
