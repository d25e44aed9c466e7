//! Bounded telemetry backlog — a fixed-capacity ring with oldest-first
//! eviction.
//!
//! ```text
//!              head (next write)
//!                 ▼
//! ┌────┬────┬────┬────┬────┬────┐
//! │ r4 │ r5 │    │ r1 │ r2 │ r3 │   count = 5
//! └────┴────┴────┴────┴────┴────┘
//!                  ▲
//!            oldest = (head - count) mod C
//! ```
//!
//! Insertion is O(1) and always succeeds: when the ring is full the oldest
//! record is overwritten, so under sustained disconnection the backlog holds
//! the most recent `C` records. Accessed only from the control-loop context —
//! no locking, no allocation beyond the records themselves.

use log::debug;

use crate::app::ports::PersistencePort;
use crate::record::Record;

/// Number of backlog slots. At the default one combined record per 10 s
/// this covers roughly 83 minutes of disconnection.
pub const BACKLOG_CAPACITY: usize = 500;

/// Fixed-capacity FIFO ring of measurement records.
pub struct TelemetryBuffer<const C: usize = BACKLOG_CAPACITY> {
    slots: [Option<Record>; C],
    /// Next write index.
    head: usize,
    /// Number of occupied slots, `0..=C`.
    count: usize,
}

impl<const C: usize> TelemetryBuffer<C> {
    pub fn new() -> Self {
        Self {
            slots: [const { None }; C],
            head: 0,
            count: 0,
        }
    }

    /// Append a record. Always succeeds; when full, the oldest record is
    /// overwritten. Returns `true` if an eviction happened so the caller
    /// can surface it.
    pub fn enqueue(&mut self, record: Record) -> bool {
        let evicted = self.count == C;
        self.slots[self.head] = Some(record);
        self.head = (self.head + 1) % C;
        if evicted {
            debug!("backlog full ({C}), oldest record evicted");
        } else {
            self.count += 1;
        }
        evicted
    }

    /// The logical front (oldest record), without removing it.
    pub fn peek_oldest(&self) -> Option<&Record> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.oldest_index()].as_ref()
    }

    /// Remove and return the logical front. Remaining records keep their
    /// relative order.
    pub fn dequeue_oldest(&mut self) -> Option<Record> {
        if self.count == 0 {
            return None;
        }
        let idx = self.oldest_index();
        self.count -= 1;
        self.slots[idx].take()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    /// Serialize every held record, oldest first, replacing any prior
    /// durable snapshot. Used only when no consumer is present, so the
    /// write happens outside any delivery timing pressure.
    pub fn drain_to_durable(
        &self,
        adapter: &mut impl PersistencePort,
    ) -> Result<(), crate::error::StorageError> {
        let records: Vec<Record> = self.iter_oldest_first().cloned().collect();
        adapter.write_all(&records)
    }

    /// Replay a previously persisted snapshot into the ring in original
    /// order, stopping once the ring is full. Blank entries are skipped;
    /// the adapter has already dropped malformed lines.
    pub fn load_from_durable(&mut self, adapter: &impl PersistencePort) -> usize {
        if !adapter.exists() {
            return 0;
        }
        let mut loaded = 0;
        match adapter.read_all() {
            Ok(records) => {
                for record in records {
                    if record.is_empty() {
                        continue;
                    }
                    if self.count == C {
                        break;
                    }
                    self.enqueue(record);
                    loaded += 1;
                }
            }
            Err(e) => {
                log::warn!("backlog replay failed: {e} — starting empty");
            }
        }
        loaded
    }

    fn oldest_index(&self) -> usize {
        (self.head + C - self.count) % C
    }

    fn iter_oldest_first(&self) -> impl Iterator<Item = &Record> {
        (0..self.count).filter_map(move |i| self.slots[(self.oldest_index() + i) % C].as_ref())
    }
}

impl<const C: usize> Default for TelemetryBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::PersistencePort;
    use crate::app::ports::testing::MemoryPersistence;

    fn rec(n: usize) -> Record {
        Record::new(format!("r{n}"))
    }

    #[test]
    fn starts_empty() {
        let buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert!(buf.peek_oldest().is_none());
    }

    #[test]
    fn fifo_order_preserved() {
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        for i in 0..3 {
            assert!(!buf.enqueue(rec(i)));
        }
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r0");
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r1");
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r2");
        assert!(buf.dequeue_oldest().is_none());
    }

    #[test]
    fn peek_does_not_remove() {
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        buf.enqueue(rec(0));
        assert_eq!(buf.peek_oldest().unwrap().as_str(), "r0");
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.peek_oldest().unwrap().as_str(), "r0");
    }

    #[test]
    fn overflow_evicts_oldest_keeps_last_c() {
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        for i in 0..4 {
            assert!(!buf.enqueue(rec(i)));
        }
        // Fifth insert overwrites r0.
        assert!(buf.enqueue(rec(4)));
        assert_eq!(buf.len(), 4);
        let drained: Vec<String> = core::iter::from_fn(|| buf.dequeue_oldest())
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(drained, ["r1", "r2", "r3", "r4"]);
    }

    #[test]
    fn sustained_overflow_keeps_most_recent_window() {
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        for i in 0..100 {
            buf.enqueue(rec(i));
        }
        let drained: Vec<String> = core::iter::from_fn(|| buf.dequeue_oldest())
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(drained, ["r96", "r97", "r98", "r99"]);
    }

    #[test]
    fn interleaved_enqueue_dequeue_stays_fifo() {
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        buf.enqueue(rec(0));
        buf.enqueue(rec(1));
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r0");
        buf.enqueue(rec(2));
        buf.enqueue(rec(3));
        buf.enqueue(rec(4)); // count == 4, wraps the arena
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r1");
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r2");
        buf.enqueue(rec(5));
        let drained: Vec<String> = core::iter::from_fn(|| buf.dequeue_oldest())
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(drained, ["r3", "r4", "r5"]);
    }

    #[test]
    fn durable_roundtrip_preserves_set_and_order() {
        for n in [0usize, 1, 4] {
            let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
            for i in 0..n {
                buf.enqueue(rec(i));
            }
            let mut store = MemoryPersistence::new();
            buf.drain_to_durable(&mut store).unwrap();

            let mut replayed: TelemetryBuffer<4> = TelemetryBuffer::new();
            let loaded = replayed.load_from_durable(&store);
            assert_eq!(loaded, n);
            for i in 0..n {
                assert_eq!(replayed.dequeue_oldest().unwrap().as_str(), format!("r{i}"));
            }
            assert!(replayed.is_empty());
        }
    }

    #[test]
    fn load_stops_at_capacity() {
        let mut store = MemoryPersistence::new();
        let many: Vec<Record> = (0..10).map(rec).collect();
        store.write_all(&many).unwrap();

        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        let loaded = buf.load_from_durable(&store);
        assert_eq!(loaded, 4);
        // Replay keeps the file's oldest records, not the newest.
        assert_eq!(buf.peek_oldest().unwrap().as_str(), "r0");
    }

    #[test]
    fn load_from_absent_store_is_noop() {
        let store = MemoryPersistence::new();
        let mut buf: TelemetryBuffer<4> = TelemetryBuffer::new();
        assert_eq!(buf.load_from_durable(&store), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn load_skips_blank_entries() {
        let mut store = MemoryPersistence::new();
        store
            .write_all(&[rec(0), Record::new(""), rec(1)])
            .unwrap();
        let mut buf: TelemetryBuffer<8> = TelemetryBuffer::new();
        assert_eq!(buf.load_from_durable(&store), 2);
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r0");
        assert_eq!(buf.dequeue_oldest().unwrap().as_str(), "r1");
    }
}
