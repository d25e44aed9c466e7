//! Outbound application events.
//!
//! The [`TelemetryService`](super::service::TelemetryService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them — log to serial, mirror onto a
//! debug characteristic, etc.

use serde::{Deserialize, Serialize};

use crate::health::ProducerId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Service started; carries the number of records replayed from the
    /// durable snapshot.
    Started { replayed: usize },

    /// A consumer subscribed to the notify characteristic.
    Connected,

    /// The consumer went away.
    Disconnected,

    /// A freshly assembled record was delivered immediately.
    MeasurementSent { seq: u32 },

    /// The direct send was refused; the record joined the backlog.
    MeasurementBuffered { seq: u32, backlog: usize },

    /// The backlog was full — its oldest record was overwritten.
    OldestEvicted,

    /// A drain session started.
    FlushStarted { backlog: usize },

    /// The backlog drained to empty; the durable snapshot was erased.
    FlushComplete { sent: u32 },

    /// The consumer disappeared mid-drain; the remainder was spilled.
    FlushInterrupted { spilled: usize },

    /// A producer was silent past the staleness threshold and got
    /// re-initialized.
    ProducerReinitialized(ProducerId),

    /// The status surface was refreshed.
    StatusPublished(StatusPayload),
}

/// The read-only status surface, refreshed on a fixed interval regardless
/// of what the delivery path is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Records currently held in the backlog.
    pub buffered_count: u32,
    /// Consumer-connected signal at refresh time.
    pub connected: bool,
    /// Sequence number of the most recently assembled record.
    pub last_sequence: u32,
}
