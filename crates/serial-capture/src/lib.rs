//! Serial Capture
//!
//! Reads sampler records from a serial port, collects them into a
//! [`MeasurementLog`] saved as JSON, and turns logged measurements into
//! time/voltage points for inspection.

mod capture;
mod error;
mod log;
mod timeline;

pub use capture::{capture_lines, CaptureConfig, SerialCapture};
pub use error::CaptureError;
pub use log::{Measurement, MeasurementLog};
pub use timeline::{select, Selection, TimePoint};
