//! System configuration parameters
//!
//! All tunable parameters for the AirNode system.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Sensor polling ---
    /// SPS30 particulate poll interval (milliseconds)
    pub particulate_poll_interval_ms: u32,
    /// SGP40 VOC poll interval (milliseconds)
    pub voc_poll_interval_ms: u32,
    /// SCD41 CO2 poll interval (milliseconds)
    pub co2_poll_interval_ms: u32,

    // --- Delivery ---
    /// Minimum spacing between GATT notifications (milliseconds)
    pub notify_min_interval_ms: u32,
    /// Status characteristic refresh interval (seconds)
    pub status_interval_secs: u32,

    // --- Health ---
    /// Producer silence tolerated before re-initialization (seconds)
    pub producer_stale_after_secs: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,

    // --- Storage ---
    /// Durable backlog snapshot path (SPIFFS mount on device)
    pub backlog_path: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sensor polling
            particulate_poll_interval_ms: 10_000,
            voc_poll_interval_ms: 10_000,
            co2_poll_interval_ms: 10_000,

            // Delivery
            notify_min_interval_ms: 500,
            status_interval_secs: 5,

            // Health
            producer_stale_after_secs: 120,

            // Timing
            control_loop_interval_ms: 1000, // 1 Hz

            // Storage
            backlog_path: "/spiffs/backlog.jsonl".to_string(),
        }
    }
}
