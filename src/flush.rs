//! Incremental backlog drain state machine.
//!
//! ```text
//!            consumer connects,
//!            backlog non-empty
//!   ┌──────┐ ─────────────────▶ ┌──────────┐
//!   │ Idle │                    │ Draining │──┐ one record per tick
//!   └──────┘ ◀───────────────── └──────────┘◀─┘
//!            backlog empty, or
//!            consumer disconnected
//! ```
//!
//! Draining moves exactly one record per control-loop tick so a deep backlog
//! can never starve sensor polling or the health check. The drain cursor is
//! the backlog's logical front: a record is dequeued only after the gate has
//! confirmed its send, so a throttled tick simply retries the same record.
//! New records arriving mid-drain are appended at the ring head and stay
//! behind the cursor until their turn.

use log::{info, warn};

use crate::app::ports::{PersistencePort, TransportPort};
use crate::buffer::TelemetryBuffer;
use crate::gate::NotifyGate;

/// Drain phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Draining,
}

/// What a single [`FlushController::step`] did. The service layer maps these
/// to outbound application events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStep {
    /// Controller was idle; nothing happened.
    Idle,
    /// One record was sent and dequeued; drain continues.
    Sent,
    /// The gate refused this tick; the front record stays put.
    Throttled,
    /// Backlog hit empty — drain finished, durable snapshot erased.
    Complete { sent: u32 },
    /// Consumer went away mid-drain; remainder spilled to durable storage.
    Interrupted { remaining: usize },
}

/// Drains the telemetry backlog through the notify gate, one record per tick.
pub struct FlushController {
    state: FlushState,
    /// Records delivered in the current drain session.
    sent_in_session: u32,
}

impl FlushController {
    pub fn new() -> Self {
        Self {
            state: FlushState::Idle,
            sent_in_session: 0,
        }
    }

    pub fn is_draining(&self) -> bool {
        self.state == FlushState::Draining
    }

    /// Consumer connection observed. Starts a drain session iff there is
    /// anything to drain; returns whether a session started.
    pub fn on_connect<const C: usize>(&mut self, buffer: &TelemetryBuffer<C>) -> bool {
        if self.state == FlushState::Draining || buffer.is_empty() {
            return false;
        }
        info!("flush: consumer connected, draining {} records", buffer.len());
        self.state = FlushState::Draining;
        self.sent_in_session = 0;
        true
    }

    /// Advance the drain by at most one record. Invoked once per tick.
    pub fn step<const C: usize>(
        &mut self,
        buffer: &mut TelemetryBuffer<C>,
        gate: &mut NotifyGate,
        transport: &mut impl TransportPort,
        persistence: &mut impl PersistencePort,
        now_ms: u64,
    ) -> FlushStep {
        if self.state == FlushState::Idle {
            return FlushStep::Idle;
        }

        if buffer.is_empty() {
            let sent = self.sent_in_session;
            info!("flush: complete, {sent} records delivered");
            if let Err(e) = persistence.remove() {
                warn!("flush: stale snapshot removal failed: {e}");
            }
            self.state = FlushState::Idle;
            return FlushStep::Complete { sent };
        }

        if !gate.is_connected() {
            let remaining = buffer.len();
            info!("flush: consumer lost, spilling {remaining} records to durable storage");
            if let Err(e) = buffer.drain_to_durable(persistence) {
                // In-memory backlog stays authoritative for the session.
                warn!("flush: durable spill failed: {e}");
            }
            self.state = FlushState::Idle;
            return FlushStep::Interrupted { remaining };
        }

        // peek_oldest is Some here: the buffer was checked non-empty above.
        let front = buffer.peek_oldest().cloned();
        match front {
            Some(record) if gate.try_send(&record, transport, now_ms) => {
                let _ = buffer.dequeue_oldest();
                self.sent_in_session += 1;
                FlushStep::Sent
            }
            _ => FlushStep::Throttled,
        }
    }
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new()
    }
}
