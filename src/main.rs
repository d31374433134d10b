//! RelayNode Firmware — Main Entry Point
//!
//! Hexagonal architecture: the relay controller and routine engine sit
//! behind port traits; this file only wires adapters to them.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayBank<RawGpio>   EspOneShotTimers   MonotonicClock        │
//! │  (OutputPort)         (TimerPort)        (Clock)               │
//! │  LogEventSink         StdDelay                                 │
//! │  (EventSink)          (DelayNs)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   RelayService: RelayController · RoutineEngine        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  expiry dispatcher (core 1) · routine worker (core 1)          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::info;

use relaynode::adapters::log_sink::LogEventSink;
use relaynode::adapters::time::{MonotonicClock, StdDelay};
use relaynode::app::ports::{Clock, EventSink};
use relaynode::app::service::RelayService;
use relaynode::config::ControllerConfig;
use relaynode::drivers::hw_init::{self, relay_pins};
use relaynode::drivers::hw_timer::EspOneShotTimers;
use relaynode::drivers::relay::RelayBank;
use relaynode::pins::RELAY_POLARITY;
use relaynode::relay::RelayController;
use relaynode::timer::ExpiryQueue;

/// How often the idle main task prints a status line.
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RelayNode v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = ControllerConfig::default();
    config.validate()?;

    // ── 3. Relay outputs (released before anything else runs) ─
    hw_init::init_relay_outputs(RELAY_POLARITY)?;
    let bank = RelayBank::new(relay_pins(), RELAY_POLARITY);

    // ── 4. Timers, clock, events ──────────────────────────────
    let expiries = Arc::new(ExpiryQueue::new());
    let timers = EspOneShotTimers::new(&expiries).map_err(|e| anyhow!("cutoff timers: {e}"))?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let sink: Arc<dyn EventSink + Send + Sync> = Arc::new(LogEventSink::new());

    // ── 5. Core ───────────────────────────────────────────────
    let relays = Arc::new(RelayController::new(
        bank,
        Box::new(timers),
        clock,
        expiries,
        Arc::clone(&sink),
        &config,
    )?);
    let _dispatcher = relays.spawn_expiry_dispatcher()?;
    let service = RelayService::new(relays, StdDelay, &config, sink);

    info!("System ready: {}", service.status().to_json());

    // ── 6. Idle ───────────────────────────────────────────────
    // Commands arrive through the network front end, which holds its own
    // handle to the service; the main task only reports.
    loop {
        std::thread::sleep(STATUS_LOG_INTERVAL);
        info!("STATUS | {}", service.status().to_json());
    }
}
