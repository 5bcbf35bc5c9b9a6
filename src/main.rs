//! Soldering station firmware: main entry point.
//!
//! Hexagonal architecture with a single cooperative control tick.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter            LogEventSink      Esp32TimeAdapter │
//! │  (Motion+Heater+Temperature) (EventSink)      (ClockPort)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Execution · G-code · PID                        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventQueue ◀── any task (UI, upload handler)                  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{error, info};

use solderstation::Error;
use solderstation::adapters::hardware::HardwareAdapter;
use solderstation::adapters::log_sink::LogEventSink;
use solderstation::adapters::time::Esp32TimeAdapter;
use solderstation::app::ports::ClockPort;
use solderstation::app::service::AppService;
use solderstation::config::SystemConfig;
use solderstation::drivers::{hw_init, watchdog::Watchdog};
use solderstation::events::Event;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SolderStation v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals().map_err(Error::from) {
        // Without GPIO config the heater gate state is unknown; halt and
        // let the watchdog reset us.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    let watchdog = Watchdog::new();

    // ── 3. Configuration ──────────────────────────────────────
    let config = SystemConfig::default();
    let tick = Duration::from_millis(u64::from(config.tick_rate_ms));

    // ── 4. Construct adapters ─────────────────────────────────
    let mut hw = HardwareAdapter::new(Esp32TimeAdapter::new());
    let mut log_sink = LogEventSink::new();
    let clock = Esp32TimeAdapter::new();

    // ── 5. Construct and start the app service ────────────────
    let mut app = AppService::new(config, Esp32TimeAdapter::new())?;
    app.start(&mut hw, &mut log_sink);
    if !app.post_event(Event::InitDone) {
        error!("Event queue refused InitDone");
    }

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let started = clock.now_ms();

        app.tick(&mut hw, &mut log_sink);
        hw.show_state(app.current_state().color());
        watchdog.feed();

        let spent = Duration::from_millis(clock.now_ms().saturating_sub(started));
        std::thread::sleep(tick.saturating_sub(spent));
    }
}
