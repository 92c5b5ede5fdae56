//! Capture Error Types

use adc_sampler::RecordError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while capturing, storing or inspecting measurements
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// File or stream I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Measurement log is not valid JSON for this layout
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A received line is not a record
    #[error("Invalid record: {0}")]
    Record(#[from] RecordError),

    /// The requested measurement is past the end of the log
    #[error("Measurement {requested} not found: measurement {last} is the last entry in {}", .path.display())]
    MeasurementNotFound {
        requested: usize,
        last: usize,
        path: PathBuf,
    },
}

impl From<tokio_serial::Error> for CaptureError {
    fn from(err: tokio_serial::Error) -> Self {
        CaptureError::SerialError(err.to_string())
    }
}
