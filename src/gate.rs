//! Connection-aware transmit throttle.
//!
//! Every outbound notify goes through [`NotifyGate::try_send`]. The gate
//! refuses to send when no consumer is connected or when the minimum notify
//! interval has not yet elapsed, so the node never pushes notifications
//! faster than the configured rate no matter how many call sites attempt a
//! send within a tick.
//!
//! The connection flag is an external signal: the control loop observes the
//! transport's connection state each tick and calls [`set_connected`] on a
//! change. No callback ever mutates gate state.
//!
//! [`set_connected`]: NotifyGate::set_connected

use log::{debug, warn};

use crate::app::ports::TransportPort;
use crate::record::Record;

/// Rate limiter + connection gate guarding the notify characteristic.
pub struct NotifyGate {
    /// Minimum spacing between two successful sends.
    min_interval_ms: u64,
    /// Timestamp of the last successful send. `None` until the first one.
    last_send_ms: Option<u64>,
    /// Mirrors the transport's connection signal.
    connected: bool,
}

impl NotifyGate {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_send_ms: None,
            connected: false,
        }
    }

    /// Record a connection-state change observed by the control loop.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Attempt one send.
    ///
    /// Fails fast with no side effect when disconnected or still inside the
    /// minimum-interval window. A transport-level send error also returns
    /// `false` — throttling and failures are ordinary backpressure here, so
    /// the caller keeps or buffers the record and retries later.
    pub fn try_send(
        &mut self,
        record: &Record,
        transport: &mut impl TransportPort,
        now_ms: u64,
    ) -> bool {
        if !self.connected {
            return false;
        }
        if let Some(last) = self.last_send_ms {
            if now_ms.saturating_sub(last) < self.min_interval_ms {
                debug!("notify throttled ({}ms window)", self.min_interval_ms);
                return false;
            }
        }
        match transport.send(record.as_bytes()) {
            Ok(()) => {
                self.last_send_ms = Some(now_ms);
                true
            }
            Err(e) => {
                warn!("notify send failed: {e} — record retained");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::testing::SimTransport;

    fn rec() -> Record {
        Record::new("{\"seq\":1}")
    }

    #[test]
    fn refuses_when_disconnected() {
        let mut gate = NotifyGate::new(500);
        let mut transport = SimTransport::new();
        assert!(!gate.try_send(&rec(), &mut transport, 0));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn first_send_passes_then_throttles() {
        let mut gate = NotifyGate::new(500);
        let mut transport = SimTransport::new();
        transport.connected = true;
        gate.set_connected(true);

        assert!(gate.try_send(&rec(), &mut transport, 1000));
        assert!(!gate.try_send(&rec(), &mut transport, 1000));
        assert!(!gate.try_send(&rec(), &mut transport, 1499));
        assert!(gate.try_send(&rec(), &mut transport, 1500));
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn never_two_successes_within_one_window() {
        let mut gate = NotifyGate::new(100);
        let mut transport = SimTransport::new();
        transport.connected = true;
        gate.set_connected(true);

        let mut success_times = Vec::new();
        for now in 0..1000u64 {
            if gate.try_send(&rec(), &mut transport, now) {
                success_times.push(now);
            }
        }
        for pair in success_times.windows(2) {
            assert!(pair[1] - pair[0] >= 100);
        }
    }

    #[test]
    fn transport_failure_is_backpressure_not_progress() {
        let mut gate = NotifyGate::new(100);
        let mut transport = SimTransport::new();
        transport.connected = true;
        transport.fail_sends = true;
        gate.set_connected(true);

        assert!(!gate.try_send(&rec(), &mut transport, 0));
        // A failed send must not consume the interval window.
        transport.fail_sends = false;
        assert!(gate.try_send(&rec(), &mut transport, 1));
    }

    #[test]
    fn disconnect_blocks_mid_stream() {
        let mut gate = NotifyGate::new(100);
        let mut transport = SimTransport::new();
        transport.connected = true;
        gate.set_connected(true);
        assert!(gate.try_send(&rec(), &mut transport, 0));

        gate.set_connected(false);
        assert!(!gate.try_send(&rec(), &mut transport, 500));
        assert_eq!(transport.sent.len(), 1);
    }
}
