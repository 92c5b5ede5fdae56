//! Sampler Error Types

use thiserror::Error;

/// Errors that can occur while configuring or running the sampler
#[derive(Debug, Error)]
pub enum SamplerError {
    /// A configuration field holds an unusable value
    #[error("Invalid configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// Buffers for the requested sample count do not fit the memory budget
    #[error("{sample_count} samples need {required_bytes} bytes, budget is {budget_bytes} bytes")]
    BufferBudgetExceeded {
        sample_count: usize,
        required_bytes: usize,
        budget_bytes: usize,
    },

    /// The analog input could not be configured
    #[error("Analog input error: {0}")]
    InputError(String),

    /// Writing a record to the serial channel failed
    #[error("Serial write error: {0}")]
    SerialError(String),
}

impl From<std::io::Error> for SamplerError {
    fn from(err: std::io::Error) -> Self {
        SamplerError::SerialError(err.to_string())
    }
}
