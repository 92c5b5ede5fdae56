//! Sampler configuration

use crate::defaults;
use crate::error::SamplerError;
use serde::{Deserialize, Serialize};

/// What each value of an emitted record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Raw converter codes
    Raw,
    /// Codes scaled to volts
    #[default]
    Voltage,
}

impl OutputMode {
    /// Buffer bytes needed per sample slot in this mode
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            OutputMode::Raw => std::mem::size_of::<u16>(),
            OutputMode::Voltage => std::mem::size_of::<u16>() + std::mem::size_of::<f32>(),
        }
    }
}

/// Record terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`, what a board-side `println` emits
    #[default]
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Samples per acquisition pass (N)
    pub sample_count: usize,
    /// Hold after every read in microseconds
    pub sample_delay_us: u32,
    /// Converter reference voltage (V)
    pub reference_voltage: f32,
    /// Full-scale converter code (1023 for 10 bits)
    pub adc_max_code: u16,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Analog input channel
    pub input_channel: u8,
    /// Raw codes or volts on the wire
    pub output_mode: OutputMode,
    /// Decimal places for voltage values
    pub decimal_places: usize,
    /// Record terminator
    pub line_ending: LineEnding,
    /// Memory available for the sample and voltage buffers (bytes)
    pub buffer_budget_bytes: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_count: defaults::SAMPLE_COUNT,
            sample_delay_us: defaults::SAMPLE_DELAY_US,
            reference_voltage: defaults::REFERENCE_VOLTAGE,
            adc_max_code: defaults::ADC_MAX_CODE,
            baud_rate: defaults::BAUD_RATE,
            input_channel: defaults::INPUT_CHANNEL,
            output_mode: OutputMode::Voltage,
            decimal_places: defaults::DECIMAL_PLACES,
            line_ending: LineEnding::CrLf,
            buffer_budget_bytes: defaults::BUFFER_BUDGET_BYTES,
        }
    }
}

impl SamplerConfig {
    /// Raw-code streaming: no voltage buffer, so the same budget holds longer passes
    pub fn raw_stream() -> Self {
        Self {
            sample_count: 800,
            output_mode: OutputMode::Raw,
            ..Default::default()
        }
    }

    /// Buffer bytes this configuration allocates
    pub fn required_buffer_bytes(&self) -> usize {
        self.sample_count
            .saturating_mul(self.output_mode.bytes_per_sample())
    }

    /// Longest record line this configuration can emit, terminator included
    pub fn max_line_bytes(&self) -> usize {
        // Two 10-digit timestamps and the comma between them
        let timestamps: usize = 2 * 10 + 1;
        let value = match self.output_mode {
            OutputMode::Raw => 5,
            OutputMode::Voltage => {
                // Codes above full scale are passed through, so size for u16::MAX
                let max_volts = f64::from(self.reference_voltage) * f64::from(u16::MAX)
                    / f64::from(self.adc_max_code.max(1));
                let int_digits = (max_volts as u64).max(1).ilog10() as usize + 1;
                int_digits + 1 + self.decimal_places
            }
        };
        timestamps
            .saturating_add(self.sample_count.saturating_mul(value + 1))
            .saturating_add(LineEnding::CrLf.as_str().len())
    }

    /// Lower bound of one pass duration: the holds alone (µs)
    pub fn min_window_us(&self) -> u64 {
        self.sample_count as u64 * u64::from(self.sample_delay_us)
    }

    /// Check the configuration against the platform budget
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.sample_count == 0 {
            return Err(SamplerError::InvalidConfig {
                field: "sample_count",
                reason: "must be at least 1".to_string(),
            });
        }

        let required_bytes = self.required_buffer_bytes();
        if required_bytes > self.buffer_budget_bytes {
            return Err(SamplerError::BufferBudgetExceeded {
                sample_count: self.sample_count,
                required_bytes,
                budget_bytes: self.buffer_budget_bytes,
            });
        }

        if self.adc_max_code == 0 {
            return Err(SamplerError::InvalidConfig {
                field: "adc_max_code",
                reason: "must be greater than 0".to_string(),
            });
        }

        if !self.reference_voltage.is_finite() || self.reference_voltage <= 0.0 {
            return Err(SamplerError::InvalidConfig {
                field: "reference_voltage",
                reason: format!("must be a positive finite value, got {}", self.reference_voltage),
            });
        }

        if self.baud_rate == 0 {
            return Err(SamplerError::InvalidConfig {
                field: "baud_rate",
                reason: "must be greater than 0".to_string(),
            });
        }

        // Timestamps are a 32-bit microsecond counter
        if self.min_window_us() > u64::from(u32::MAX) {
            return Err(SamplerError::InvalidConfig {
                field: "sample_delay_us",
                reason: format!(
                    "{} samples x {} us overflows the 32-bit microsecond counter",
                    self.sample_count, self.sample_delay_us
                ),
            });
        }

        Ok(())
    }
}
