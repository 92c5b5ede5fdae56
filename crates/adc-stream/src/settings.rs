//! Layered settings: defaults, optional file, then environment

use adc_sampler::SamplerConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serial_capture::CaptureConfig;
use std::path::Path;

/// Environment prefix, e.g. `ADC_STREAM_SAMPLER__SAMPLE_COUNT=200`
pub const ENV_PREFIX: &str = "ADC_STREAM";

/// All runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Board-side sampler
    pub sampler: SamplerConfig,
    /// Host-side capture
    pub capture: CaptureConfig,
}

impl Settings {
    /// Load settings, the file (if any) overriding defaults and the
    /// environment overriding both
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(path: Option<&Path>, environment: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(environment)
            .build()?
            .try_deserialize()
    }
}
