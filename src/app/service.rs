//! Telemetry service — the hexagonal core.
//!
//! [`TelemetryService`] owns the backlog, the drain state machine, the
//! notify gate and the producer health monitor. It exposes a single
//! non-blocking [`tick`](TelemetryService::tick) that the control loop
//! invokes on a fixed period; all I/O flows through port traits injected at
//! the call site, so the entire delivery pipeline runs under test with
//! in-memory fakes.
//!
//! ```text
//!  ProducerHub ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │       TelemetryService       │
//! TransportPort ◀──│  backlog · flush · gate ·    │──▶ PersistencePort
//!                  │  health                      │
//!                  └──────────────────────────────┘
//! ```
//!
//! Tick order is fixed: health check, connection edges, one drain step,
//! producer polling, then the direct-send-or-buffer decision for a freshly
//! assembled record. The gate structurally bounds the whole tick to at most
//! two send attempts and one success.

use log::info;

use crate::buffer::{BACKLOG_CAPACITY, TelemetryBuffer};
use crate::config::SystemConfig;
use crate::flush::{FlushController, FlushStep};
use crate::gate::NotifyGate;
use crate::health::{HealthMonitor, ProducerId};

use super::events::{AppEvent, StatusPayload};
use super::ports::{EventSink, PersistencePort, ProducerHub, TransportPort};

// ───────────────────────────────────────────────────────────────
// TelemetryService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates record admission and delivery.
pub struct TelemetryService {
    buffer: TelemetryBuffer<BACKLOG_CAPACITY>,
    flush: FlushController,
    gate: NotifyGate,
    health: HealthMonitor,
    /// Sequence number for the next combined record.
    next_seq: u32,
    /// Edge detector for the transport's connection signal.
    link_was_connected: bool,
    status_interval_ms: u64,
    last_status_ms: Option<u64>,
}

impl TelemetryService {
    /// Construct the service from configuration. `now_ms` seeds the health
    /// monitor so silent-from-boot sensors get one full threshold before
    /// the first re-initialization.
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        Self {
            buffer: TelemetryBuffer::new(),
            flush: FlushController::new(),
            gate: NotifyGate::new(u64::from(config.notify_min_interval_ms)),
            health: HealthMonitor::new(
                u64::from(config.producer_stale_after_secs) * 1000,
                now_ms,
            ),
            next_seq: 1,
            link_was_connected: false,
            status_interval_ms: u64::from(config.status_interval_secs) * 1000,
            last_status_ms: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Replay the durable snapshot into the backlog. Call once at startup,
    /// before the first `tick`.
    pub fn start(&mut self, persistence: &impl PersistencePort, sink: &mut impl EventSink) {
        let replayed = self.buffer.load_from_durable(persistence);
        if replayed > 0 {
            info!("replayed {replayed} backlog records from durable storage");
        }
        sink.emit(&AppEvent::Started { replayed });
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle. Every sub-step is a single bounded,
    /// non-blocking unit of work.
    pub fn tick(
        &mut self,
        hub: &mut impl ProducerHub,
        transport: &mut impl TransportPort,
        persistence: &mut impl PersistencePort,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) {
        // 1. Producer health — a stale producer gets exactly one reinit
        //    attempt per threshold window.
        for id in ProducerId::ALL {
            if self.health.is_stale(id, now_ms) {
                hub.reinitialize(id);
                self.health.mark_reinit(id, now_ms);
                sink.emit(&AppEvent::ProducerReinitialized(id));
            }
        }

        // 2. Connection edges, observed (not callback-driven).
        let connected = transport.is_connected();
        if connected != self.link_was_connected {
            self.link_was_connected = connected;
            self.gate.set_connected(connected);
            if connected {
                sink.emit(&AppEvent::Connected);
                if self.flush.on_connect(&self.buffer) {
                    sink.emit(&AppEvent::FlushStarted {
                        backlog: self.buffer.len(),
                    });
                }
            } else {
                sink.emit(&AppEvent::Disconnected);
            }
        }

        // 3. Drain at most one backlog record.
        match self
            .flush
            .step(&mut self.buffer, &mut self.gate, transport, persistence, now_ms)
        {
            FlushStep::Complete { sent } => sink.emit(&AppEvent::FlushComplete { sent }),
            FlushStep::Interrupted { remaining } => {
                sink.emit(&AppEvent::FlushInterrupted { spilled: remaining });
            }
            FlushStep::Idle | FlushStep::Sent | FlushStep::Throttled => {}
        }

        // 4. Poll due producers; admit a combined record if one assembled.
        let outcome = hub.poll_due(now_ms, self.next_seq);
        for id in &outcome.succeeded {
            self.health.record_success(*id, now_ms);
        }
        if let Some(measurement) = outcome.measurement {
            let seq = measurement.seq;
            self.next_seq = seq.wrapping_add(1);
            let record = measurement.to_record();
            // Single admission point: deliver now, or keep for later.
            if self.gate.try_send(&record, transport, now_ms) {
                sink.emit(&AppEvent::MeasurementSent { seq });
            } else {
                if self.buffer.enqueue(record) {
                    sink.emit(&AppEvent::OldestEvicted);
                }
                sink.emit(&AppEvent::MeasurementBuffered {
                    seq,
                    backlog: self.buffer.len(),
                });
            }
        }

        // 5. Status surface refresh, independent of the delivery path.
        if self.status_due(now_ms) {
            self.last_status_ms = Some(now_ms);
            let status = StatusPayload {
                buffered_count: self.buffer.len() as u32,
                connected,
                last_sequence: self.next_seq.wrapping_sub(1),
            };
            transport.publish_status(&status);
            sink.emit(&AppEvent::StatusPublished(status));
        }
    }

    /// Spill the backlog to durable storage outside the tick path — used
    /// at orderly shutdown when no consumer is present.
    pub fn spill(&mut self, persistence: &mut impl PersistencePort) {
        if self.buffer.is_empty() || self.gate.is_connected() {
            return;
        }
        if let Err(e) = self.buffer.drain_to_durable(persistence) {
            log::warn!("shutdown spill failed: {e}");
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_draining(&self) -> bool {
        self.flush.is_draining()
    }

    fn status_due(&self, now_ms: u64) -> bool {
        match self.last_status_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.status_interval_ms,
        }
    }
}
