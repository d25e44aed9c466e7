//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TelemetryService (domain)
//! ```
//!
//! Driven adapters (BLE transport, flash storage, sensor hub, event sinks)
//! implement these traits. The [`TelemetryService`](super::service::TelemetryService)
//! consumes them via generics, so the domain core never touches hardware
//! directly and the whole delivery pipeline runs under test with in-memory
//! fakes.

use crate::config::SystemConfig;
use crate::error::{CommsError, StorageError};
use crate::health::ProducerId;
use crate::record::{Measurement, Record};

use super::events::StatusPayload;

// ───────────────────────────────────────────────────────────────
// Persistence port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Durable snapshot of the telemetry backlog.
///
/// Implementations must tolerate absence (first boot) and partial or corrupt
/// content — a bad entry is skipped, never fatal. `write_all` replaces any
/// prior snapshot wholesale; there is no append path.
pub trait PersistencePort {
    /// Persist the given records, oldest first, replacing any prior snapshot.
    fn write_all(&mut self, records: &[Record]) -> Result<(), StorageError>;

    /// Read back every stored record in original order. An absent store
    /// yields an empty list, not an error.
    fn read_all(&self) -> Result<Vec<Record>, StorageError>;

    /// Whether a snapshot currently exists.
    fn exists(&self) -> bool;

    /// Erase the snapshot. Succeeds if none exists.
    fn remove(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → BLE)
// ───────────────────────────────────────────────────────────────

/// Outbound delivery surface.
///
/// The core only ever reads the connection signal and pushes bytes; the
/// connect/advertise lifecycle belongs entirely to the adapter.
pub trait TransportPort {
    /// Push one record's payload to the subscribed consumer.
    fn send(&mut self, payload: &[u8]) -> Result<(), CommsError>;

    /// Current consumer-connected signal.
    fn is_connected(&self) -> bool;

    /// Refresh the read-only status surface. Best-effort; failures are the
    /// adapter's problem.
    fn publish_status(&mut self, status: &StatusPayload);
}

// ───────────────────────────────────────────────────────────────
// Producer hub port (driven adapter: sensors → domain)
// ───────────────────────────────────────────────────────────────

/// Result of one polling pass over the producers.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Producers that completed a fully successful read this pass.
    pub succeeded: heapless::Vec<ProducerId, { ProducerId::COUNT }>,
    /// A combined record, present only when all producers were fresh
    /// simultaneously (freshness flags are cleared on assembly).
    pub measurement: Option<Measurement>,
}

/// Read-side port: the domain polls producers through this.
pub trait ProducerHub {
    /// Poll every producer whose interval has elapsed. `next_seq` is the
    /// sequence number to stamp on a combined record if one is assembled.
    fn poll_due(&mut self, now_ms: u64, next_seq: u32) -> PollOutcome;

    /// Re-run a producer's initialization sequence after a staleness trip.
    fn reinitialize(&mut self, producer: ProducerId);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, a second
/// GATT characteristic, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting. Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory fakes for unit tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::error::{CommsError, StorageError};

    /// `PersistencePort` backed by a plain `Vec`, with optional injected
    /// write failures.
    pub struct MemoryPersistence {
        stored: Option<Vec<Record>>,
        pub fail_writes: bool,
    }

    impl MemoryPersistence {
        pub fn new() -> Self {
            Self {
                stored: None,
                fail_writes: false,
            }
        }

        pub fn stored_strings(&self) -> Vec<String> {
            self.stored
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|r| r.as_str().to_string())
                .collect()
        }
    }

    impl PersistencePort for MemoryPersistence {
        fn write_all(&mut self, records: &[Record]) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Io);
            }
            self.stored = Some(records.to_vec());
            Ok(())
        }

        fn read_all(&self) -> Result<Vec<Record>, StorageError> {
            Ok(self.stored.clone().unwrap_or_default())
        }

        fn exists(&self) -> bool {
            self.stored.is_some()
        }

        fn remove(&mut self) -> Result<(), StorageError> {
            self.stored = None;
            Ok(())
        }
    }

    /// `TransportPort` that records every send and status refresh.
    pub struct SimTransport {
        pub connected: bool,
        pub fail_sends: bool,
        pub sent: Vec<Vec<u8>>,
        pub statuses: Vec<StatusPayload>,
    }

    impl SimTransport {
        pub fn new() -> Self {
            Self {
                connected: false,
                fail_sends: false,
                sent: Vec::new(),
                statuses: Vec::new(),
            }
        }

        pub fn sent_strings(&self) -> Vec<String> {
            self.sent
                .iter()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .collect()
        }
    }

    impl TransportPort for SimTransport {
        fn send(&mut self, payload: &[u8]) -> Result<(), CommsError> {
            if !self.connected {
                return Err(CommsError::NotConnected);
            }
            if self.fail_sends {
                return Err(CommsError::NotifyFailed);
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn publish_status(&mut self, status: &StatusPayload) {
            self.statuses.push(status.clone());
        }
    }
}
