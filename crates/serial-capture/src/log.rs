//! Measurement log and its JSON layout
//!
//! The log is stored as one object keyed `"measurement 1"`, `"measurement 2"`,
//! ... in capture order, each entry holding `"start time"`, `"end_time"` and
//! `"voltages"`.

use crate::error::CaptureError;
use adc_sampler::ParsedRecord;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const KEY_PREFIX: &str = "measurement ";

/// One received acquisition pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Counter at the first read (µs)
    #[serde(rename = "start time")]
    pub start_time: u32,
    /// Counter after the last hold (µs)
    #[serde(rename = "end_time")]
    pub end_time: u32,
    /// Values in transmission order (volts, or raw codes in raw mode)
    pub voltages: Vec<f64>,
}

impl Measurement {
    /// Pass duration, correct across a counter wrap
    pub fn duration_us(&self) -> u32 {
        self.end_time.wrapping_sub(self.start_time)
    }
}

impl From<ParsedRecord> for Measurement {
    fn from(record: ParsedRecord) -> Self {
        Self {
            start_time: record.window.start_us,
            end_time: record.window.end_us,
            voltages: record.values,
        }
    }
}

/// Ordered collection of measurements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementLog {
    measurements: Vec<Measurement>,
}

impl MeasurementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    /// Parse a received line and append it
    pub fn push_line(&mut self, line: &str) -> Result<&Measurement, CaptureError> {
        let record = ParsedRecord::parse(line)?;
        self.measurements.push(record.into());
        let index = self.measurements.len() - 1;
        Ok(&self.measurements[index])
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Measurement by 1-based number, as used in the JSON keys
    pub fn get(&self, number: usize) -> Option<&Measurement> {
        number
            .checked_sub(1)
            .and_then(|index| self.measurements.get(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the log as JSON, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        info!("Saved {} measurements to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = std::fs::read_to_string(path)?;
        let log = Self::from_json(&json)?;
        debug!("Loaded {} measurements from {}", log.len(), path.display());
        Ok(log)
    }
}

impl From<Vec<Measurement>> for MeasurementLog {
    fn from(measurements: Vec<Measurement>) -> Self {
        Self { measurements }
    }
}

impl<'a> IntoIterator for &'a MeasurementLog {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

impl Serialize for MeasurementLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.measurements.len()))?;
        for (index, measurement) in self.measurements.iter().enumerate() {
            map.serialize_entry(&format!("{}{}", KEY_PREFIX, index + 1), measurement)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MeasurementLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = HashMap::<String, Measurement>::deserialize(deserializer)?;

        let mut numbered = entries
            .into_iter()
            .map(|(key, measurement)| {
                key.strip_prefix(KEY_PREFIX)
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| (n, measurement))
                    .ok_or_else(|| {
                        <D::Error as de::Error>::custom(format!("unexpected key {:?}", key))
                    })
            })
            .collect::<Result<Vec<_>, D::Error>>()?;

        // Key order in the file is not trusted; numbers are
        numbered.sort_by_key(|(n, _)| *n);

        Ok(Self {
            measurements: numbered.into_iter().map(|(_, m)| m).collect(),
        })
    }
}
