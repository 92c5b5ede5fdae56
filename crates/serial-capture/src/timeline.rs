//! Time/voltage views of logged measurements
//!
//! The board reports only the pass window, so sample times are spread
//! evenly between start and end, both ends included.

use crate::error::CaptureError;
use crate::log::{Measurement, MeasurementLog};
use serde::Serialize;
use std::path::Path;

/// One sample placed on the time axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint {
    /// Milliseconds since the chosen origin
    pub time_ms: f64,
    /// Value minus the requested offset
    pub voltage: f64,
}

impl Measurement {
    /// Points of this measurement, times relative to `origin_us`, values
    /// shifted down by `offset`
    pub fn timeline(&self, origin_us: u32, offset: f64) -> Vec<TimePoint> {
        let start_ms = f64::from(self.start_time.wrapping_sub(origin_us)) / 1000.0;
        let end_ms = start_ms + f64::from(self.duration_us()) / 1000.0;
        let count = self.voltages.len();

        let step = if count > 1 {
            (end_ms - start_ms) / (count - 1) as f64
        } else {
            0.0
        };

        self.voltages
            .iter()
            .enumerate()
            .map(|(i, value)| TimePoint {
                time_ms: start_ms + step * i as f64,
                voltage: value - offset,
            })
            .collect()
    }
}

/// Which measurements to lay out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every measurement, relative to the first start
    All,
    /// One measurement by 1-based number, relative to its own start
    One(usize),
}

impl Selection {
    /// `number < 1` selects all
    pub fn from_number(number: i64) -> Self {
        if number < 1 {
            Selection::All
        } else {
            Selection::One(number as usize)
        }
    }
}

/// Lay out the selected measurements of `log`, one point series each
///
/// `path` only names the log in the not-found error.
pub fn select(
    log: &MeasurementLog,
    selection: Selection,
    offset: f64,
    path: &Path,
) -> Result<Vec<Vec<TimePoint>>, CaptureError> {
    match selection {
        Selection::All => {
            let Some(first) = log.get(1) else {
                return Ok(Vec::new());
            };
            let origin = first.start_time;
            Ok(log.iter().map(|m| m.timeline(origin, offset)).collect())
        }
        Selection::One(number) => {
            let measurement = log
                .get(number)
                .ok_or_else(|| CaptureError::MeasurementNotFound {
                    requested: number,
                    last: log.len(),
                    path: path.to_path_buf(),
                })?;
            Ok(vec![measurement.timeline(measurement.start_time, offset)])
        }
    }
}
