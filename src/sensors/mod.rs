//! Sensor subsystem — the three Sensirion drivers and the aggregating
//! [`SensorHub`].
//!
//! Each producer is polled on its own fixed interval. A successful read
//! updates the hub's latest-values cache and marks that producer fresh;
//! when all three are fresh simultaneously the hub assembles one combined
//! [`Measurement`] and clears every freshness flag, so each combined record
//! is built from a reading no older than one full polling round.

pub mod co2;
pub mod particulate;
pub mod voc;

use log::{debug, warn};

use crate::app::ports::{PollOutcome, ProducerHub};
use crate::config::SystemConfig;
use crate::health::ProducerId;
use crate::record::Measurement;
use co2::{Co2Reading, Co2Sensor};
use particulate::{ParticulateReading, ParticulateSensor};
use voc::{VocReading, VocSensor};

/// Latest successful reading per producer. `None` until the first success.
#[derive(Default)]
struct LatestValues {
    particulate: Option<ParticulateReading>,
    voc: Option<VocReading>,
    co2: Option<Co2Reading>,
}

/// Owns the sensor drivers and produces combined measurement records.
pub struct SensorHub {
    particulate: ParticulateSensor,
    voc: VocSensor,
    co2: Co2Sensor,
    /// Poll interval per producer, indexed by `ProducerId`.
    intervals_ms: [u64; ProducerId::COUNT],
    /// Last poll attempt per producer. `None` = due immediately.
    last_poll_ms: [Option<u64>; ProducerId::COUNT],
    /// Fresh-since-last-combined-record flag per producer.
    fresh: [bool; ProducerId::COUNT],
    latest: LatestValues,
}

impl SensorHub {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            particulate: ParticulateSensor::new(),
            voc: VocSensor::new(),
            co2: Co2Sensor::new(),
            intervals_ms: [
                u64::from(config.particulate_poll_interval_ms),
                u64::from(config.voc_poll_interval_ms),
                u64::from(config.co2_poll_interval_ms),
            ],
            last_poll_ms: [None; ProducerId::COUNT],
            fresh: [false; ProducerId::COUNT],
            latest: LatestValues::default(),
        }
    }

    /// Run each driver's initialization sequence once at boot. Failures are
    /// logged and left to the staleness watchdog.
    pub fn startup(&mut self) {
        for id in ProducerId::ALL {
            if let Err(e) = self.reinit_driver(id) {
                warn!("{}: startup init failed: {e}", id.name());
            }
        }
    }

    fn due(&self, id: ProducerId, now_ms: u64) -> bool {
        match self.last_poll_ms[id as usize] {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.intervals_ms[id as usize],
        }
    }

    fn poll_one(&mut self, id: ProducerId) -> Result<(), crate::error::SensorError> {
        match id {
            ProducerId::Particulate => {
                let r = self.particulate.poll()?;
                debug!(
                    "SPS30: pm2.5={} pm10={} typ={}nm",
                    r.pm2_5, r.pm10, r.typical_size
                );
                self.latest.particulate = Some(r);
            }
            ProducerId::Voc => {
                let r = self.voc.poll()?;
                debug!("SGP40: raw={}", r.raw);
                self.latest.voc = Some(r);
            }
            ProducerId::Co2 => {
                let r = self.co2.poll()?;
                debug!(
                    "SCD41: co2={}ppm t={:.1}C rh={:.1}%",
                    r.co2_ppm, r.temperature_c, r.humidity_rh
                );
                self.latest.co2 = Some(r);
            }
        }
        Ok(())
    }

    fn reinit_driver(&mut self, id: ProducerId) -> Result<(), crate::error::SensorError> {
        match id {
            ProducerId::Particulate => self.particulate.reinitialize(),
            ProducerId::Voc => self.voc.reinitialize(),
            ProducerId::Co2 => self.co2.reinitialize(),
        }
    }

    fn assemble(&self, seq: u32) -> Option<Measurement> {
        let pm = self.latest.particulate?;
        let voc = self.latest.voc?;
        let co2 = self.latest.co2?;
        Some(Measurement {
            seq,
            pm1_0: pm.pm1_0,
            pm2_5: pm.pm2_5,
            pm4_0: pm.pm4_0,
            pm10: pm.pm10,
            voc_raw: voc.raw,
            co2_ppm: co2.co2_ppm,
            temperature_c: co2.temperature_c,
            humidity_rh: co2.humidity_rh,
        })
    }
}

impl ProducerHub for SensorHub {
    fn poll_due(&mut self, now_ms: u64, next_seq: u32) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        for id in ProducerId::ALL {
            if !self.due(id, now_ms) {
                continue;
            }
            self.last_poll_ms[id as usize] = Some(now_ms);
            match self.poll_one(id) {
                Ok(()) => {
                    self.fresh[id as usize] = true;
                    let _ = outcome.succeeded.push(id);
                }
                Err(e) => {
                    // Transient: flag stays false, retried next interval.
                    warn!("{}: read failed: {e}", id.name());
                }
            }
        }

        if self.fresh.iter().all(|&f| f) {
            outcome.measurement = self.assemble(next_seq);
            if outcome.measurement.is_some() {
                self.fresh = [false; ProducerId::COUNT];
            }
        }
        outcome
    }

    fn reinitialize(&mut self, producer: ProducerId) {
        if let Err(e) = self.reinit_driver(producer) {
            warn!("{}: re-initialization failed: {e}", producer.name());
        }
    }
}
