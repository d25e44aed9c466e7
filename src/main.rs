//! AirNode Firmware — Main Entry Point
//!
//! Hexagonal architecture around a single-threaded, non-blocking control
//! loop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  BleTransport     FileBacklog     NvsAdapter   MonotonicClock│
//! │  (TransportPort)  (Persistence)   (ConfigPort) (time source) │
//! │  LogEventSink     SensorHub                                  │
//! │  (EventSink)      (ProducerHub)                              │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            TelemetryService (pure logic)               │  │
//! │  │  backlog ring · flush · notify gate · health watchdog  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tick runs health check → drain step → producer polling →
//! admit-or-buffer → status refresh, each a single bounded unit of work.
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
mod buffer;
mod config;
mod error;
mod flush;
mod gate;
mod health;
mod record;

mod adapters;
pub mod app;
mod drivers;
mod sensors;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::backlog::FileBacklog;
use adapters::ble::BleTransport;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use adapters::time::MonotonicClock;
use app::ports::ConfigPort;
use app::service::TelemetryService;
use config::SystemConfig;
use sensors::SensorHub;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirNode v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => match nvs.load() {
            Ok(cfg) => {
                info!("Config loaded from NVS");
                cfg
            }
            Err(e) => {
                warn!("NVS config load failed ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Storage + peripherals ──────────────────────────────
    mount_spiffs()?;
    init_i2c()?;

    // ── 4. Construct adapters ─────────────────────────────────
    let mut hub = SensorHub::new(&config);
    hub.startup();

    let mut transport =
        BleTransport::init().map_err(|e| anyhow::anyhow!("BLE bring-up failed: {e}"))?;
    let mut persistence = FileBacklog::new(&config.backlog_path);
    let mut sink = LogEventSink::new();
    let clock = MonotonicClock::new();

    // ── 5. Service + durable replay ───────────────────────────
    let mut service = TelemetryService::new(&config, clock.now_ms());
    service.start(&persistence, &mut sink);

    // ── 6. Control loop ───────────────────────────────────────
    let tick_ms = u64::from(config.control_loop_interval_ms);
    info!("Control loop running at {}ms per tick", tick_ms);

    loop {
        let tick_start = clock.now_ms();
        service.tick(&mut hub, &mut transport, &mut persistence, &mut sink, tick_start);

        // Sleep out the remainder of the tick; a long device transaction
        // simply shortens the pause, it never extends the period budget.
        let elapsed = clock.now_ms().saturating_sub(tick_start);
        let pause = tick_ms.saturating_sub(elapsed).max(1);
        std::thread::sleep(core::time::Duration::from_millis(pause));
    }
}

// ── Platform bring-up helpers ─────────────────────────────────

/// Mount the SPIFFS partition that backs the durable backlog snapshot.
fn mount_spiffs() -> Result<()> {
    use esp_idf_svc::sys::*;
    const BASE_PATH: &[u8] = b"/spiffs\0";
    let conf = esp_vfs_spiffs_conf_t {
        base_path: BASE_PATH.as_ptr() as *const _,
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: registered once at boot, before any file access.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        anyhow::bail!("SPIFFS mount failed (err {ret})");
    }
    info!("SPIFFS mounted at /spiffs");
    Ok(())
}

/// Bring up the shared I2C bus. SDA = GPIO8, SCL = GPIO9.
fn init_i2c() -> Result<()> {
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::units::FromValueType;

    let peripherals = Peripherals::take()?;
    let i2c_config = I2cConfig::new().baudrate(100.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &i2c_config,
    )?;
    drivers::i2c_bus::init_bus(i2c);
    Ok(())
}
