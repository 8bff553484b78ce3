//! In-memory phase timeout table.
//!
//! Implements [`StateTimeoutPort`] for the binary's scan/pause loop: the
//! orchestrator writes the phase durations during setup, the main loop
//! reads them back to know how long to sleep in each phase.

use log::debug;

use crate::app::ports::{ScanPhase, StateTimeoutPort};

/// Timeout (ms) per scan phase.  Zero means "not configured".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimeouts {
    scanning_ms: u32,
    pausing_ms: u32,
}

impl PhaseTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(&self, phase: ScanPhase) -> u32 {
        match phase {
            ScanPhase::Scanning => self.scanning_ms,
            ScanPhase::Pausing => self.pausing_ms,
        }
    }

    pub fn duration(&self, phase: ScanPhase) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.timeout_ms(phase)))
    }
}

impl StateTimeoutPort for PhaseTimeouts {
    fn modify_timeout(&mut self, phase: ScanPhase, timeout_ms: u32) {
        debug!("PHASE | {:?} timeout = {}ms", phase, timeout_ms);
        match phase {
            ScanPhase::Scanning => self.scanning_ms = timeout_ms,
            ScanPhase::Pausing => self.pausing_ms = timeout_ms,
        }
    }
}
