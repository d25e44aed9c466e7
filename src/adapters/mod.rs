//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements      | Connects to                 |
//! |------------|-----------------|-----------------------------|
//! | `ble`      | TransportPort   | Bluedroid GATT server       |
//! | `backlog`  | PersistencePort | SPIFFS newline-delimited file|
//! | `log_sink` | EventSink       | Serial log output           |
//! | `nvs`      | ConfigPort      | NVS / in-memory store       |
//! | `time`     | —               | ESP32 system timer          |

pub mod backlog;
pub mod ble;
pub mod log_sink;
pub mod nvs;
pub mod time;
