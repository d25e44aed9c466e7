//! End-to-end delivery tests over the real host-side adapters: simulated
//! sensors feed the hub, records flow through the service into the BLE
//! simulation backend and the file-backed backlog snapshot.
//!
//! Host-only: the sensor simulation statics do not exist on ESP32 targets.

#![cfg(not(target_os = "espidf"))]

use std::sync::Mutex;

use airnode::adapters::backlog::FileBacklog;
use airnode::adapters::ble::BleTransport;
use airnode::app::events::AppEvent;
use airnode::app::ports::{EventSink, PersistencePort};
use airnode::app::service::TelemetryService;
use airnode::config::SystemConfig;
use airnode::health::ProducerId;
use airnode::record::{Measurement, Record};
use airnode::sensors::{SensorHub, co2, particulate, voc};

/// The sensor simulation statics are process-wide; serialize the tests.
static SIM_LOCK: Mutex<()> = Mutex::new(());

struct RecordingSink {
    events: Vec<AppEvent>,
}

impl RecordingSink {
    fn new() -> Self {
        Self { events: Vec::new() }
    }

    fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

fn sim_all_ok() {
    particulate::sim_set_fail(false);
    voc::sim_set_fail(false);
    co2::sim_set_fail(false);
    particulate::sim_set_mass(2, 5, 7, 10);
    voc::sim_set_voc_raw(26_000);
    co2::sim_set_raw(700, 0x6667, 0x8000);
}

struct Fixture {
    _dir: tempfile::TempDir,
    backlog: FileBacklog,
    ble: BleTransport,
    hub: SensorHub,
    service: TelemetryService,
    sink: RecordingSink,
}

impl Fixture {
    fn new() -> Self {
        let config = SystemConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let backlog = FileBacklog::new(dir.path().join("backlog.jsonl"));
        Self {
            _dir: dir,
            backlog,
            ble: BleTransport::init().unwrap(),
            hub: SensorHub::new(&config),
            service: TelemetryService::new(&config, 0),
            sink: RecordingSink::new(),
        }
    }

    fn tick(&mut self, now_ms: u64) {
        self.service.tick(
            &mut self.hub,
            &mut self.ble,
            &mut self.backlog,
            &mut self.sink,
            now_ms,
        );
    }

    fn sent_seqs(&self) -> Vec<u32> {
        self.ble
            .sent
            .iter()
            .map(|b| {
                let line = String::from_utf8(b.clone()).unwrap();
                Measurement::from_record(&Record::new(line)).unwrap().seq
            })
            .collect()
    }
}

#[test]
fn offline_records_drain_in_order_on_connect() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    let mut fx = Fixture::new();

    // Three combined records accumulate while no consumer is present.
    for t in [0, 10_000, 20_000] {
        fx.tick(t);
    }
    assert_eq!(fx.service.buffered_count(), 3);
    assert!(fx.ble.sent.is_empty());

    // Orderly spill while offline leaves a durable snapshot behind.
    fx.service.spill(&mut fx.backlog);
    assert!(fx.backlog.exists());

    // A consumer appears: one record per tick, oldest first.
    fx.ble.sim_set_connected(true);
    for t in [21_000, 22_000, 23_000] {
        fx.tick(t);
    }
    assert_eq!(fx.service.buffered_count(), 0);

    // The next tick observes the empty backlog and erases the snapshot.
    fx.tick(24_000);
    assert!(!fx.service.is_draining());
    assert!(!fx.backlog.exists());

    assert_eq!(fx.sent_seqs(), [1, 2, 3]);
    assert_eq!(
        fx.sink
            .count(|e| matches!(e, AppEvent::FlushComplete { sent: 3 })),
        1
    );
}

#[test]
fn disconnect_mid_drain_spills_remainder_and_stops_sending() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    let mut fx = Fixture::new();

    for t in [0, 10_000, 20_000] {
        fx.tick(t);
    }
    fx.ble.sim_set_connected(true);
    fx.tick(21_000); // drains seq 1

    fx.ble.sim_set_connected(false);
    fx.tick(22_000); // observes the loss, spills the rest

    assert_eq!(
        fx.sink
            .count(|e| matches!(e, AppEvent::FlushInterrupted { spilled: 2 })),
        1
    );
    let spilled_seqs: Vec<u32> = fx
        .backlog
        .read_all()
        .unwrap()
        .iter()
        .map(|r| Measurement::from_record(r).unwrap().seq)
        .collect();
    assert_eq!(spilled_seqs, [2, 3]);

    // Zero further sends until reconnection.
    fx.tick(23_000);
    fx.tick(24_000);
    assert_eq!(fx.sent_seqs(), [1]);
}

#[test]
fn sustained_disconnection_keeps_only_newest_records() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    let mut fx = Fixture::new();

    // One more record than the ring holds.
    let capacity = 500u64;
    for i in 0..=capacity {
        fx.tick(i * 10_000);
    }
    assert_eq!(fx.service.buffered_count(), capacity as usize);
    assert!(
        fx.sink
            .count(|e| matches!(e, AppEvent::OldestEvicted))
            == 1
    );

    // The survivor at the front is seq 2 — seq 1 was the eviction victim.
    fx.ble.sim_set_connected(true);
    fx.tick(capacity * 10_000 + 1000);
    assert_eq!(fx.sent_seqs(), [2]);
}

#[test]
fn snapshot_replays_across_reboot() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    let config = SystemConfig::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backlog.jsonl");

    {
        let mut backlog = FileBacklog::new(&path);
        let mut ble = BleTransport::init().unwrap();
        let mut hub = SensorHub::new(&config);
        let mut sink = RecordingSink::new();
        let mut service = TelemetryService::new(&config, 0);
        service.tick(&mut hub, &mut ble, &mut backlog, &mut sink, 0);
        service.tick(&mut hub, &mut ble, &mut backlog, &mut sink, 10_000);
        service.spill(&mut backlog);
    }

    // "Reboot": a fresh service replays the snapshot and drains it.
    let mut backlog = FileBacklog::new(&path);
    let mut ble = BleTransport::init().unwrap();
    let mut hub = SensorHub::new(&config);
    let mut sink = RecordingSink::new();
    let mut service = TelemetryService::new(&config, 0);
    service.start(&backlog, &mut sink);
    assert_eq!(service.buffered_count(), 2);

    // The first drain tick also assembles a fresh measurement, which the
    // gate defers into the backlog; four ticks empty everything out.
    ble.sim_set_connected(true);
    for t in [500_000, 501_000, 502_000, 503_000] {
        service.tick(&mut hub, &mut ble, &mut backlog, &mut sink, t);
    }
    assert_eq!(service.buffered_count(), 0);
    service.tick(&mut hub, &mut ble, &mut backlog, &mut sink, 504_000);
    assert!(!backlog.exists());
}

#[test]
fn silent_producer_reinitializes_once_then_recovers() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    co2::sim_set_fail(true);
    let mut fx = Fixture::new();

    // Two minutes of ticks: the CO2 producer never succeeds, the others do.
    for t in (0..=121_000u64).step_by(1000) {
        fx.tick(t);
    }
    assert_eq!(
        fx.sink
            .count(|e| matches!(e, AppEvent::ProducerReinitialized(ProducerId::Co2))),
        1
    );
    assert_eq!(
        fx.sink
            .count(|e| matches!(e, AppEvent::ProducerReinitialized(_))),
        1
    );
    // No combined record without a fresh CO2 reading.
    assert_eq!(fx.service.buffered_count(), 0);

    // The sensor comes back; the next full round assembles a record.
    co2::sim_set_fail(false);
    fx.tick(130_000);
    assert_eq!(fx.service.buffered_count(), 1);
}

#[test]
fn status_surface_tracks_backlog_and_sequence() {
    let _g = SIM_LOCK.lock().unwrap();
    sim_all_ok();
    let mut fx = Fixture::new();

    fx.tick(0);
    fx.tick(10_000);

    let status = fx.ble.last_status.clone().expect("status published");
    assert_eq!(status.buffered_count, 2);
    assert!(!status.connected);
    assert_eq!(status.last_sequence, 2);
}
