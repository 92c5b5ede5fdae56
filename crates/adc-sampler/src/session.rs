//! Acquisition session: buffers, timestamps and the sampling pass

use crate::config::{OutputMode, SamplerConfig};
use crate::error::SamplerError;
use crate::hal::{AnalogInput, MonotonicClock};
use crate::record::{AcquisitionWindow, Record, RecordValues};
use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

/// Linear code-to-volts scale: `raw * reference / full_scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageScale {
    reference_voltage: f32,
    adc_max_code: u16,
}

impl VoltageScale {
    pub fn new(reference_voltage: f32, adc_max_code: u16) -> Self {
        Self {
            reference_voltage,
            adc_max_code,
        }
    }

    /// Convert one code. Full scale maps to the reference voltage exactly.
    pub fn to_volts(&self, raw: u16) -> f32 {
        // Multiply before dividing so raw == full scale cancels exactly
        let volts = f64::from(raw) * f64::from(self.reference_voltage)
            / f64::from(self.adc_max_code);
        volts as f32
    }
}

/// Outcome of one acquisition pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Timestamps bounding the pass
    pub window: AcquisitionWindow,
    /// Reads that failed; those slots kept their previous contents
    pub read_faults: usize,
}

/// Owns both buffers and the timestamps of the last pass
///
/// Buffers are allocated once here and overwritten in place on every pass;
/// their length never changes.
pub struct AcquisitionSession {
    /// Raw codes, exactly `sample_count` slots
    samples: Box<[u16]>,
    /// Scaled values, `sample_count` slots in voltage mode, empty in raw mode
    voltages: Box<[f32]>,
    /// Window of the last completed pass
    window: AcquisitionWindow,
    /// Hold after every read
    sample_delay_us: u32,
    scale: VoltageScale,
    output_mode: OutputMode,
    decimal_places: usize,
    /// Completed passes
    passes: u64,
    /// Whether `voltages` reflects the last pass
    scaled: bool,
}

impl AcquisitionSession {
    /// Validate the configuration and allocate the buffers
    pub fn new(config: &SamplerConfig) -> Result<Self, SamplerError> {
        config.validate()?;

        let voltage_slots = match config.output_mode {
            OutputMode::Voltage => config.sample_count,
            OutputMode::Raw => 0,
        };

        info!(
            "Allocating acquisition buffers: {} samples, {} bytes",
            config.sample_count,
            config.required_buffer_bytes()
        );

        Ok(Self {
            samples: vec![0u16; config.sample_count].into_boxed_slice(),
            voltages: vec![0.0f32; voltage_slots].into_boxed_slice(),
            window: AcquisitionWindow::default(),
            sample_delay_us: config.sample_delay_us,
            scale: VoltageScale::new(config.reference_voltage, config.adc_max_code),
            output_mode: config.output_mode,
            decimal_places: config.decimal_places,
            passes: 0,
            scaled: false,
        })
    }

    /// Run one sampling pass: start timestamp, N reads each followed by the
    /// hold, end timestamp.
    ///
    /// A failed read is not retried; its slot keeps the previous contents.
    pub fn acquire<I, C, D>(&mut self, input: &mut I, clock: &C, delay: &mut D) -> PassReport
    where
        I: AnalogInput,
        C: MonotonicClock,
        D: DelayNs,
    {
        self.scaled = false;
        let mut read_faults = 0;

        let start_us = clock.now_us();
        for (slot, sample) in self.samples.iter_mut().enumerate() {
            match input.read() {
                Ok(code) => *sample = code,
                Err(e) => {
                    read_faults += 1;
                    warn!("Analog read failed at slot {}: {:?}", slot, e);
                }
            }
            delay.delay_us(self.sample_delay_us);
        }
        let end_us = clock.now_us();

        self.window = AcquisitionWindow::new(start_us, end_us);
        self.passes += 1;

        debug!(
            "Pass {} complete: {} samples in {} us",
            self.passes,
            self.samples.len(),
            self.window.duration_us()
        );

        PassReport {
            window: self.window,
            read_faults,
        }
    }

    /// Scale every raw code of the last pass into the voltage buffer.
    /// No-op in raw mode.
    pub fn scale(&mut self) {
        if self.output_mode == OutputMode::Raw {
            return;
        }
        for (volts, raw) in self.voltages.iter_mut().zip(self.samples.iter()) {
            *volts = self.scale.to_volts(*raw);
        }
        self.scaled = true;
    }

    /// The last completed pass as a wire record
    ///
    /// `None` before the first pass, or in voltage mode when the last pass
    /// has not been scaled yet.
    pub fn record(&self) -> Option<Record<'_>> {
        if self.passes == 0 {
            return None;
        }
        let values = match self.output_mode {
            OutputMode::Raw => RecordValues::Raw(&self.samples),
            OutputMode::Voltage if self.scaled => RecordValues::Voltage {
                values: &self.voltages,
                decimal_places: self.decimal_places,
            },
            OutputMode::Voltage => return None,
        };
        Some(Record::new(self.window, values))
    }

    /// Raw codes of the last pass
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Scaled values of the last scaled pass (empty in raw mode)
    pub fn voltages(&self) -> &[f32] {
        &self.voltages
    }

    pub fn window(&self) -> AcquisitionWindow {
        self.window
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Number of completed passes
    pub fn passes(&self) -> u64 {
        self.passes
    }
}
