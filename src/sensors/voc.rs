//! SGP40 VOC sensor (I2C address 0x59).
//!
//! Reports the raw VOC signal in sensor ticks, uncompensated: the
//! measure-raw command is issued with the datasheet default words for
//! humidity (0x8000) and temperature (0x6666), which disable on-chip
//! compensation. Index processing is the consumer's concern.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::info;

use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::i2c_bus;

pub const SGP40_I2C_ADDR: u8 = 0x59;

/// Default compensation words: humidity off, temperature off.
pub const RH_DISABLED: u16 = 0x8000;
pub const T_DISABLED: u16 = 0x6666;
/// Self-test pass word.
pub const SELF_TEST_OK: u16 = 0xD400;

#[cfg(target_os = "espidf")]
const CMD_MEASURE_RAW: u16 = 0x260F;
#[cfg(target_os = "espidf")]
const CMD_SELF_TEST: u16 = 0x280E;
#[cfg(target_os = "espidf")]
const CMD_HEATER_OFF: u16 = 0x3615;

static SIM_VOC_RAW: AtomicU16 = AtomicU16::new(0);
static SIM_FAIL: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_voc_raw(raw: u16) {
    SIM_VOC_RAW.store(raw, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fail(fail: bool) {
    SIM_FAIL.store(fail, Ordering::Relaxed);
}

/// One successful SGP40 read.
#[derive(Debug, Clone, Copy)]
pub struct VocReading {
    /// Raw signal, sensor ticks.
    pub raw: u16,
}

pub struct VocSensor;

impl VocSensor {
    pub fn new() -> Self {
        Self
    }

    /// Turn the heater off and re-run the self-test. The SGP40 has no
    /// soft-reset of its own; a failed self-test is reported but does not
    /// block subsequent polls — the watchdog will trip again if the sensor
    /// stays dead.
    pub fn reinitialize(&mut self) -> Result<(), SensorError> {
        #[cfg(target_os = "espidf")]
        {
            let _ = i2c_bus::write_command(SGP40_I2C_ADDR, CMD_HEATER_OFF, &[]);
            i2c_bus::write_command(SGP40_I2C_ADDR, CMD_SELF_TEST, &[])?;
            // Self-test takes up to 320 ms per datasheet.
            std::thread::sleep(core::time::Duration::from_millis(320));
            let [result] = i2c_bus::read_words::<1>(SGP40_I2C_ADDR)?;
            if result != SELF_TEST_OK {
                log::warn!("SGP40: self-test failed (0x{result:04X})");
                return Err(SensorError::SelfTestFailed);
            }
        }
        info!("SGP40: self-test passed");
        Ok(())
    }

    pub fn poll(&mut self) -> Result<VocReading, SensorError> {
        self.read_raw()
    }

    #[cfg(target_os = "espidf")]
    fn read_raw(&self) -> Result<VocReading, SensorError> {
        i2c_bus::write_command(SGP40_I2C_ADDR, CMD_MEASURE_RAW, &[RH_DISABLED, T_DISABLED])?;
        // Raw signal is ready 30 ms after the command.
        std::thread::sleep(core::time::Duration::from_millis(30));
        let [raw] = i2c_bus::read_words::<1>(SGP40_I2C_ADDR)?;
        Ok(VocReading { raw })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw(&self) -> Result<VocReading, SensorError> {
        if SIM_FAIL.load(Ordering::Relaxed) {
            return Err(SensorError::I2cReadFailed);
        }
        Ok(VocReading {
            raw: SIM_VOC_RAW.load(Ordering::Relaxed),
        })
    }
}

impl Default for VocSensor {
    fn default() -> Self {
        Self::new()
    }
}
