//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A debug-characteristic adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { replayed } => {
                info!("START | replayed={replayed}");
            }
            AppEvent::Connected => info!("LINK  | consumer connected"),
            AppEvent::Disconnected => info!("LINK  | consumer disconnected"),
            AppEvent::MeasurementSent { seq } => {
                info!("SEND  | seq={seq} delivered");
            }
            AppEvent::MeasurementBuffered { seq, backlog } => {
                info!("QUEUE | seq={seq} buffered ({backlog} pending)");
            }
            AppEvent::OldestEvicted => {
                warn!("QUEUE | backlog full, oldest record dropped");
            }
            AppEvent::FlushStarted { backlog } => {
                info!("FLUSH | started, {backlog} records pending");
            }
            AppEvent::FlushComplete { sent } => {
                info!("FLUSH | complete, {sent} records delivered");
            }
            AppEvent::FlushInterrupted { spilled } => {
                warn!("FLUSH | interrupted, {spilled} records spilled to flash");
            }
            AppEvent::ProducerReinitialized(id) => {
                warn!("WATCH | {} re-initialized after silence", id.name());
            }
            AppEvent::StatusPublished(s) => {
                info!(
                    "STAT  | buffered={} connected={} seq={}",
                    s.buffered_count, s.connected, s.last_sequence
                );
            }
        }
    }
}
