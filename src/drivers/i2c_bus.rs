//! Shared I2C bus transactions for the Sensirion sensor family.
//!
//! All three sensors (SPS30, SGP40, SCD41) speak the same wire dialect:
//! 16-bit big-endian commands, optional 16-bit arguments, and data returned
//! as 16-bit words each followed by a CRC-8 byte (polynomial 0x31, init
//! 0xFF).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: a process-wide `I2cDriver` initialised once by
//! [`init_bus`]. On host/test: only the pure helpers (CRC, word packing)
//! are compiled; the drivers read from injection statics instead.

use crate::error::SensorError;

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x31;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Serialize a command plus arguments into the on-wire byte layout:
/// `cmd_hi cmd_lo [arg_hi arg_lo crc]*`.
pub fn encode_command(cmd: u16, args: &[u16], out: &mut [u8]) -> usize {
    out[0] = (cmd >> 8) as u8;
    out[1] = (cmd & 0xFF) as u8;
    let mut n = 2;
    for &arg in args {
        let word = [(arg >> 8) as u8, (arg & 0xFF) as u8];
        out[n] = word[0];
        out[n + 1] = word[1];
        out[n + 2] = crc8(&word);
        n += 3;
    }
    n
}

/// Parse a response buffer of `word+crc` triplets into words, verifying
/// each CRC.
pub fn decode_words(raw: &[u8], out: &mut [u16]) -> Result<(), SensorError> {
    debug_assert_eq!(raw.len(), out.len() * 3);
    for (i, chunk) in raw.chunks_exact(3).enumerate() {
        if crc8(&chunk[..2]) != chunk[2] {
            return Err(SensorError::CrcMismatch);
        }
        out[i] = (u16::from(chunk[0]) << 8) | u16::from(chunk[1]);
    }
    Ok(())
}

// ── ESP-IDF bus access ───────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Mutex;

    use esp_idf_hal::delay::BLOCK;
    use esp_idf_hal::i2c::I2cDriver;
    use log::info;

    use super::*;

    static BUS: Mutex<Option<I2cDriver<'static>>> = Mutex::new(None);

    /// Hand the initialised bus driver to this module. Called once from
    /// `main` after peripheral bring-up.
    pub fn init_bus(driver: I2cDriver<'static>) {
        info!("I2C bus initialised");
        *BUS.lock().unwrap() = Some(driver);
    }

    /// Write a bare command, or a command with CRC-protected arguments.
    pub fn write_command(addr: u8, cmd: u16, args: &[u16]) -> Result<(), SensorError> {
        let mut buf = [0u8; 2 + 3 * 8];
        let n = encode_command(cmd, args, &mut buf);
        let mut guard = BUS.lock().unwrap();
        let bus = guard.as_mut().ok_or(SensorError::I2cWriteFailed)?;
        bus.write(addr, &buf[..n], BLOCK)
            .map_err(|_| SensorError::I2cWriteFailed)
    }

    /// Read `N` CRC-protected words from the device.
    pub fn read_words<const N: usize>(addr: u8) -> Result<[u16; N], SensorError> {
        let mut raw = [0u8; 64];
        let len = N * 3;
        let mut guard = BUS.lock().unwrap();
        let bus = guard.as_mut().ok_or(SensorError::I2cReadFailed)?;
        bus.read(addr, &mut raw[..len], BLOCK)
            .map_err(|_| SensorError::I2cReadFailed)?;
        drop(guard);

        let mut words = [0u16; N];
        decode_words(&raw[..len], &mut words)?;
        Ok(words)
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{init_bus, read_words, write_command};
