//! Wire record: `start_us,end_us,value_0,...,value_{N-1}`
//!
//! One record per acquisition pass, fields separated by commas, no trailing
//! comma, one line terminator. Both timestamps are the 32-bit microsecond
//! counter at the start and end of the pass.

use crate::config::LineEnding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use thiserror::Error;

/// Timestamps bounding one acquisition pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcquisitionWindow {
    /// Counter value before the first read (µs)
    pub start_us: u32,
    /// Counter value after the last hold (µs)
    pub end_us: u32,
}

impl AcquisitionWindow {
    pub fn new(start_us: u32, end_us: u32) -> Self {
        Self { start_us, end_us }
    }

    /// Pass duration, correct across one counter wrap
    pub fn duration_us(&self) -> u32 {
        self.end_us.wrapping_sub(self.start_us)
    }
}

/// Values carried by a record
#[derive(Debug, Clone, Copy)]
pub enum RecordValues<'a> {
    /// Raw converter codes
    Raw(&'a [u16]),
    /// Scaled values printed with fixed decimal places
    Voltage {
        values: &'a [f32],
        decimal_places: usize,
    },
}

impl RecordValues<'_> {
    pub fn len(&self) -> usize {
        match self {
            RecordValues::Raw(codes) => codes.len(),
            RecordValues::Voltage { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Borrowed view of one completed pass, ready to print
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub window: AcquisitionWindow,
    pub values: RecordValues<'a>,
}

impl<'a> Record<'a> {
    pub fn new(window: AcquisitionWindow, values: RecordValues<'a>) -> Self {
        Self { window, values }
    }

    /// Number of comma-separated fields on the wire
    pub fn field_count(&self) -> usize {
        2 + self.values.len()
    }

    /// Write the record and its terminator
    pub fn write_to<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        line_ending: LineEnding,
    ) -> std::io::Result<()> {
        write!(writer, "{}{}", self, line_ending.as_str())
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.window.start_us, self.window.end_us)?;
        match self.values {
            RecordValues::Raw(codes) => {
                for code in codes {
                    write!(f, ",{}", code)?;
                }
            }
            RecordValues::Voltage {
                values,
                decimal_places,
            } => {
                for value in values {
                    write!(f, ",{:.*}", decimal_places, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Errors while parsing a received record line
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// Nothing but a terminator
    #[error("Empty record line")]
    Empty,

    /// Fewer than the two timestamp fields
    #[error("Record has {0} field(s), expected at least 2")]
    MissingTimestamp(usize),

    /// A timestamp field is not an unsigned 32-bit integer
    #[error("Invalid {field} timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    /// A value field is not a number
    #[error("Invalid value at index {index}: {value:?}")]
    InvalidValue { index: usize, value: String },
}

/// Owned record decoded from a received line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub window: AcquisitionWindow,
    pub values: Vec<f64>,
}

impl ParsedRecord {
    /// Parse one line, with or without its `\n` / `\r\n` terminator
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(RecordError::Empty);
        }

        let mut fields = line.split(',');
        let start = fields.next().ok_or(RecordError::MissingTimestamp(0))?;
        let end = fields.next().ok_or(RecordError::MissingTimestamp(1))?;

        let window = AcquisitionWindow {
            start_us: parse_timestamp("start", start)?,
            end_us: parse_timestamp("end", end)?,
        };

        let values = fields
            .enumerate()
            .map(|(index, field)| {
                field
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| RecordError::InvalidValue {
                        index,
                        value: field.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { window, values })
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<u32, RecordError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| RecordError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}
