//! Measurement records and their wire encoding.
//!
//! A [`Record`] is one encoded measurement: an opaque, immutable, single-line
//! payload. Everything downstream of the aggregation step (backlog, durable
//! spill, GATT notify) treats records as bytes — only the consumer and the
//! tests ever decode them again.

use serde::{Deserialize, Serialize};

/// One opaque encoded measurement payload.
///
/// Guaranteed newline-free so records can be persisted newline-delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record(String);

impl Record {
    /// Wrap an already-encoded payload. Embedded newlines are stripped so
    /// the durable file format stays one-record-per-line.
    pub fn new(payload: impl Into<String>) -> Self {
        let mut s = payload.into();
        if s.contains('\n') {
            s.retain(|c| c != '\n' && c != '\r');
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for Record {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A combined snapshot of all three sensors, assembled only when every
/// producer has reported a fresh reading since the last combined record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Monotonically increasing record sequence number.
    pub seq: u32,
    /// Mass concentrations from the particulate sensor, ug/m3.
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm4_0: u16,
    pub pm10: u16,
    /// Raw VOC signal (uncompensated ticks).
    pub voc_raw: u16,
    /// CO2 concentration, ppm.
    pub co2_ppm: u16,
    /// Temperature, degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity, %RH.
    pub humidity_rh: f32,
}

impl Measurement {
    /// Encode as a single JSON line.
    pub fn to_record(&self) -> Record {
        // Serializing a plain struct of numbers cannot fail.
        let line = serde_json::to_string(self).unwrap_or_default();
        Record::new(line)
    }

    /// Decode a record produced by [`to_record`](Self::to_record).
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_str(record.as_str())
    }
}
