//! SCD41 CO2 sensor (I2C address 0x62).
//!
//! Reports CO2 concentration plus on-die temperature and relative humidity.
//! The device produces one measurement every ~5 s in periodic mode; reads
//! are gated on its data-ready status so a poll between samples is a
//! transient [`SensorError::DataNotReady`], not a failure.
//!
//! Raw-word conversions per datasheet:
//! `T = -45 + 175 * raw / 65535`, `RH = 100 * raw / 65535`.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::info;

use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::i2c_bus;

pub const SCD41_I2C_ADDR: u8 = 0x62;

#[cfg(target_os = "espidf")]
const CMD_WAKE_UP: u16 = 0x36F6;
#[cfg(target_os = "espidf")]
const CMD_STOP_PERIODIC: u16 = 0x3F86;
#[cfg(target_os = "espidf")]
const CMD_REINIT: u16 = 0x3646;
#[cfg(target_os = "espidf")]
const CMD_START_PERIODIC: u16 = 0x21B1;
#[cfg(target_os = "espidf")]
const CMD_DATA_READY: u16 = 0xE4B8;
#[cfg(target_os = "espidf")]
const CMD_READ_MEASUREMENT: u16 = 0xEC05;

static SIM_CO2: AtomicU16 = AtomicU16::new(0);
static SIM_TEMP_RAW: AtomicU16 = AtomicU16::new(0);
static SIM_RH_RAW: AtomicU16 = AtomicU16::new(0);
static SIM_FAIL: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_raw(co2_ppm: u16, temp_raw: u16, rh_raw: u16) {
    SIM_CO2.store(co2_ppm, Ordering::Relaxed);
    SIM_TEMP_RAW.store(temp_raw, Ordering::Relaxed);
    SIM_RH_RAW.store(rh_raw, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fail(fail: bool) {
    SIM_FAIL.store(fail, Ordering::Relaxed);
}

/// One successful SCD41 read.
#[derive(Debug, Clone, Copy)]
pub struct Co2Reading {
    pub co2_ppm: u16,
    pub temperature_c: f32,
    pub humidity_rh: f32,
}

pub struct Co2Sensor {
    started: bool,
}

impl Co2Sensor {
    pub fn new() -> Self {
        Self { started: false }
    }

    /// Full wake/stop/reinit/start sequence, the clean-state dance the
    /// datasheet prescribes after any doubt about the device's mode.
    pub fn reinitialize(&mut self) -> Result<(), SensorError> {
        #[cfg(target_os = "espidf")]
        {
            use core::time::Duration;
            // Wake-up is not acknowledged when the device is already awake.
            let _ = i2c_bus::write_command(SCD41_I2C_ADDR, CMD_WAKE_UP, &[]);
            std::thread::sleep(Duration::from_millis(30));
            i2c_bus::write_command(SCD41_I2C_ADDR, CMD_STOP_PERIODIC, &[])?;
            std::thread::sleep(Duration::from_millis(500));
            i2c_bus::write_command(SCD41_I2C_ADDR, CMD_REINIT, &[])?;
            std::thread::sleep(Duration::from_millis(30));
            i2c_bus::write_command(SCD41_I2C_ADDR, CMD_START_PERIODIC, &[])?;
        }
        self.started = true;
        info!("SCD41: periodic measurement started");
        Ok(())
    }

    pub fn poll(&mut self) -> Result<Co2Reading, SensorError> {
        if !self.started {
            self.reinitialize()?;
        }
        self.read_raw()
    }

    #[cfg(target_os = "espidf")]
    fn read_raw(&self) -> Result<Co2Reading, SensorError> {
        i2c_bus::write_command(SCD41_I2C_ADDR, CMD_DATA_READY, &[])?;
        let [status] = i2c_bus::read_words::<1>(SCD41_I2C_ADDR)?;
        // Lower 11 bits zero = no fresh measurement.
        if status & 0x07FF == 0 {
            return Err(SensorError::DataNotReady);
        }

        i2c_bus::write_command(SCD41_I2C_ADDR, CMD_READ_MEASUREMENT, &[])?;
        let [co2, temp_raw, rh_raw] = i2c_bus::read_words::<3>(SCD41_I2C_ADDR)?;
        Ok(Self::convert(co2, temp_raw, rh_raw))
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw(&self) -> Result<Co2Reading, SensorError> {
        if SIM_FAIL.load(Ordering::Relaxed) {
            return Err(SensorError::I2cReadFailed);
        }
        Ok(Self::convert(
            SIM_CO2.load(Ordering::Relaxed),
            SIM_TEMP_RAW.load(Ordering::Relaxed),
            SIM_RH_RAW.load(Ordering::Relaxed),
        ))
    }

    fn convert(co2: u16, temp_raw: u16, rh_raw: u16) -> Co2Reading {
        Co2Reading {
            co2_ppm: co2,
            temperature_c: -45.0 + 175.0 * f32::from(temp_raw) / 65535.0,
            humidity_rh: 100.0 * f32::from(rh_raw) / 65535.0,
        }
    }
}

impl Default for Co2Sensor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_matches_datasheet_corners() {
        let r = Co2Sensor::convert(400, 0, 0);
        assert_eq!(r.co2_ppm, 400);
        assert!((r.temperature_c - -45.0).abs() < 0.01);
        assert!((r.humidity_rh - 0.0).abs() < 0.01);

        let r = Co2Sensor::convert(400, u16::MAX, u16::MAX);
        assert!((r.temperature_c - 130.0).abs() < 0.01);
        assert!((r.humidity_rh - 100.0).abs() < 0.01);
    }

    #[test]
    fn conversion_midscale() {
        let r = Co2Sensor::convert(800, 0x6667, 0x8000);
        // 0x6667/65535 ≈ 0.4 → about -45 + 70 = 25 °C
        assert!((r.temperature_c - 25.0).abs() < 0.1);
        assert!((r.humidity_rh - 50.0).abs() < 0.1);
    }
}
