//! Analog Sampler-Transmitter
//!
//! Samples one analog input at a fixed cadence into a buffer allocated once,
//! optionally scales raw ADC codes to volts, and streams every completed pass
//! as one CSV record over a byte channel.
//!
//! The hardware is reached through three seams: [`AnalogInput`] for the
//! converter, [`MonotonicClock`] for the microsecond counter and
//! [`embedded_hal::delay::DelayNs`] for the inter-sample hold. Host
//! implementations live in [`hal`] and [`sim`].

mod config;
mod error;
pub mod hal;
pub mod record;
mod session;
pub mod sim;
mod transmitter;

pub use config::{LineEnding, OutputMode, SamplerConfig};
pub use error::SamplerError;
pub use hal::{AnalogInput, MonotonicClock};
pub use record::{AcquisitionWindow, ParsedRecord, Record, RecordError, RecordValues};
pub use session::{AcquisitionSession, PassReport, VoltageScale};
pub use transmitter::{CycleReport, RunStats, Sampler, Transmitter};

/// Board defaults
pub mod defaults {
    /// Samples per pass
    pub const SAMPLE_COUNT: usize = 100;
    /// Hold after each read (µs), tuned against 50 Hz mains ripple
    pub const SAMPLE_DELAY_US: u32 = 980;
    /// Reference voltage of the converter (V)
    pub const REFERENCE_VOLTAGE: f32 = 5.0;
    /// Full-scale code of a 10-bit converter
    pub const ADC_MAX_CODE: u16 = 1023;
    /// Serial baud rate
    pub const BAUD_RATE: u32 = 9600;
    /// Analog input channel (A0)
    pub const INPUT_CHANNEL: u8 = 0;
    /// Decimal places printed for voltages
    pub const DECIMAL_PLACES: usize = 2;
    /// Buffer memory budget (bytes): 306 raw+voltage slots of 6 bytes
    pub const BUFFER_BUDGET_BYTES: usize = 1836;
}
