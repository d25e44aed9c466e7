//! Producer-staleness watchdog.
//!
//! Tracks the last successful read per sensor producer. A producer that has
//! been silent past the staleness threshold gets its re-initialization
//! routine invoked by the control loop; the timestamp is then reset so the
//! next retry is spaced by a full threshold — a wedged sensor is re-probed
//! every two minutes, not every tick.

use log::warn;

/// Identity of a measurement producer. Doubles as the index into the
/// monitor's timestamp table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProducerId {
    Particulate = 0,
    Voc = 1,
    Co2 = 2,
}

impl ProducerId {
    pub const COUNT: usize = 3;
    pub const ALL: [ProducerId; Self::COUNT] =
        [Self::Particulate, Self::Voc, Self::Co2];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Particulate => "SPS30",
            Self::Voc => "SGP40",
            Self::Co2 => "SCD41",
        }
    }
}

/// Per-producer last-success bookkeeping.
pub struct HealthMonitor {
    /// Milliseconds of the last successful read (or the last reinit
    /// attempt), per producer. Seeded with boot time so a sensor that
    /// never responds gets one full threshold before the first reinit.
    last_success_ms: [u64; ProducerId::COUNT],
    threshold_ms: u64,
}

impl HealthMonitor {
    pub fn new(threshold_ms: u64, now_ms: u64) -> Self {
        Self {
            last_success_ms: [now_ms; ProducerId::COUNT],
            threshold_ms,
        }
    }

    /// A producer delivered a fully successful read.
    pub fn record_success(&mut self, producer: ProducerId, now_ms: u64) {
        self.last_success_ms[producer as usize] = now_ms;
    }

    /// Strictly past the threshold: `now - last > threshold`.
    pub fn is_stale(&self, producer: ProducerId, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_success_ms[producer as usize]) > self.threshold_ms
    }

    /// A re-initialization was attempted; space the next one by a full
    /// threshold regardless of whether it helped.
    pub fn mark_reinit(&mut self, producer: ProducerId, now_ms: u64) {
        warn!(
            "{} silent for over {}s — re-initialized",
            producer.name(),
            self.threshold_ms / 1000
        );
        self.last_success_ms[producer as usize] = now_ms;
    }

    /// Milliseconds since the given producer last succeeded.
    pub fn silence_ms(&self, producer: ProducerId, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_success_ms[producer as usize])
    }
}
