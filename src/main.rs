//! BLE scanner firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BluedroidRadio   BluedroidCentral   LogRegistry   Esp32Clock  │
//! │  (Radio+Scan)     (GATT client)      (Registry)    (Clock)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  ScanOrchestrator · AdvertisementClassifier · Probe    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scan/pause loop driven by PhaseTimeouts                       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use blescanner::adapters::bluedroid::{BluedroidCentral, BluedroidRadio};
use blescanner::adapters::config_store::{self, ConfigStore};
use blescanner::adapters::device_id;
use blescanner::adapters::phase_table::PhaseTimeouts;
use blescanner::adapters::registry::{BatteryCandidates, BatteryCheckGate, LogRegistry};
use blescanner::adapters::time::Esp32Clock;
use blescanner::app::classifier::AdvertisementClassifier;
use blescanner::app::orchestrator::ScanOrchestrator;
use blescanner::app::ports::{ClockPort, ScanPhase};
use blescanner::app::probe::BatteryProbe;

/// Optional JSON config baked in at build time.
const CONFIG_JSON: Option<&str> = option_env!("BLESCANNER_CONFIG_JSON");

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  BLE-Scanner v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config + identity ──────────────────────────────────
    let mut store = ConfigStore::new()?;
    let config = config_store::resolve(&mut store, CONFIG_JSON);
    let address = device_id::bluetooth_address();
    let name = device_id::device_name(&address);
    info!("Device name: {} ({})", name, address);

    // ── 3. Construct adapters ─────────────────────────────────
    let candidates = BatteryCandidates::new();
    let classifier = AdvertisementClassifier::new(LogRegistry::new(candidates.clone()));
    let mut timeouts = PhaseTimeouts::new();

    let mut scanner =
        ScanOrchestrator::new(BluedroidRadio::new(), Esp32Clock::new()).with_device_name(&name);
    scanner.setup(&config, &mut timeouts, Box::new(classifier))?;

    let mut probe = BatteryProbe::new(BluedroidCentral::new());
    let mut gate = BatteryCheckGate::new(scanner.config().battcheck_timeout_secs);
    let clock = Esp32Clock::new();

    info!("System ready. Entering scan loop.");

    // ── 4. Scan / pause loop ──────────────────────────────────
    loop {
        if !scanner.scan_start() {
            warn!("Scan: start refused, retrying after pause");
        }
        std::thread::sleep(timeouts.duration(ScanPhase::Scanning));
        scanner.scan_stop();

        // Battery probes run while the radio is idle.
        for address in candidates.drain() {
            if gate.should_check(address, clock.now_secs()) {
                let reading = probe.read_battery_level(&address);
                info!(
                    "BATT | {} | success={} level={:?}",
                    address, reading.success, reading.level
                );
            }
        }

        std::thread::sleep(timeouts.duration(ScanPhase::Pausing));
    }
}
