//! SPS30 particulate matter sensor (I2C address 0x69).
//!
//! Reports PM1.0/2.5/4.0/10 mass concentrations plus the typical particle
//! size, in the sensor's uint16 output format. The device measures
//! continuously once started; reads are gated on its data-ready flag.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: Sensirion-dialect transactions over the shared I2C bus.
//! On host/test: reads from injection statics.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::info;

use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::i2c_bus;

pub const SPS30_I2C_ADDR: u8 = 0x69;

#[cfg(target_os = "espidf")]
const CMD_START_MEASUREMENT: u16 = 0x0010;
#[cfg(target_os = "espidf")]
const CMD_STOP_MEASUREMENT: u16 = 0x0104;
#[cfg(target_os = "espidf")]
const CMD_READ_DATA_READY: u16 = 0x0202;
#[cfg(target_os = "espidf")]
const CMD_READ_MEASUREMENT: u16 = 0x0300;
/// Output-format argument to start-measurement: big-endian uint16 values.
#[cfg(target_os = "espidf")]
const FORMAT_UINT16: u16 = 0x0500;

// Host-side injection statics.
static SIM_PM: [AtomicU16; 4] = [
    AtomicU16::new(0),
    AtomicU16::new(0),
    AtomicU16::new(0),
    AtomicU16::new(0),
];
static SIM_TYPICAL_SIZE: AtomicU16 = AtomicU16::new(0);
static SIM_FAIL: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_mass(pm1_0: u16, pm2_5: u16, pm4_0: u16, pm10: u16) {
    SIM_PM[0].store(pm1_0, Ordering::Relaxed);
    SIM_PM[1].store(pm2_5, Ordering::Relaxed);
    SIM_PM[2].store(pm4_0, Ordering::Relaxed);
    SIM_PM[3].store(pm10, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fail(fail: bool) {
    SIM_FAIL.store(fail, Ordering::Relaxed);
}

/// One successful SPS30 read.
#[derive(Debug, Clone, Copy)]
pub struct ParticulateReading {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm4_0: u16,
    pub pm10: u16,
    /// Typical particle size, nm.
    pub typical_size: u16,
}

pub struct ParticulateSensor {
    started: bool,
}

impl ParticulateSensor {
    pub fn new() -> Self {
        Self { started: false }
    }

    /// Start continuous measurement and log the device serial. Called at
    /// boot and again on re-initialization.
    pub fn reinitialize(&mut self) -> Result<(), SensorError> {
        #[cfg(target_os = "espidf")]
        {
            // A wedged device may ignore stop; issue it anyway so start
            // lands on a clean state.
            let _ = i2c_bus::write_command(SPS30_I2C_ADDR, CMD_STOP_MEASUREMENT, &[]);
            i2c_bus::write_command(SPS30_I2C_ADDR, CMD_START_MEASUREMENT, &[FORMAT_UINT16])?;
        }
        self.started = true;
        info!("SPS30: measurement started");
        Ok(())
    }

    /// Read one measurement, gated on the data-ready flag.
    pub fn poll(&mut self) -> Result<ParticulateReading, SensorError> {
        if !self.started {
            self.reinitialize()?;
        }
        self.read_raw()
    }

    #[cfg(target_os = "espidf")]
    fn read_raw(&self) -> Result<ParticulateReading, SensorError> {
        i2c_bus::write_command(SPS30_I2C_ADDR, CMD_READ_DATA_READY, &[])?;
        let [ready] = i2c_bus::read_words::<1>(SPS30_I2C_ADDR)?;
        if ready == 0 {
            return Err(SensorError::DataNotReady);
        }

        i2c_bus::write_command(SPS30_I2C_ADDR, CMD_READ_MEASUREMENT, &[])?;
        // mc1.0 mc2.5 mc4.0 mc10 nc0.5 nc1.0 nc2.5 nc4.0 nc10 typ_size
        let words = i2c_bus::read_words::<10>(SPS30_I2C_ADDR)?;
        Ok(ParticulateReading {
            pm1_0: words[0],
            pm2_5: words[1],
            pm4_0: words[2],
            pm10: words[3],
            typical_size: words[9],
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw(&self) -> Result<ParticulateReading, SensorError> {
        if SIM_FAIL.load(Ordering::Relaxed) {
            return Err(SensorError::I2cReadFailed);
        }
        Ok(ParticulateReading {
            pm1_0: SIM_PM[0].load(Ordering::Relaxed),
            pm2_5: SIM_PM[1].load(Ordering::Relaxed),
            pm4_0: SIM_PM[2].load(Ordering::Relaxed),
            pm10: SIM_PM[3].load(Ordering::Relaxed),
            typical_size: SIM_TYPICAL_SIZE.load(Ordering::Relaxed),
        })
    }
}

impl Default for ParticulateSensor {
    fn default() -> Self {
        Self::new()
    }
}
