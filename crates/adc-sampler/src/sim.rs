//! Simulated hardware for running the sampler without a board
//!
//! [`SimClock`] is a shared virtual counter that only moves when a
//! [`SimDelay`] created from it is called, so a full pass runs instantly and
//! its timestamps are exact. [`SimulatedInput`] evaluates a sine source at
//! whatever clock it is given; pair it with a [`SimClock`] for instant
//! passes or with [`crate::hal::SystemClock`] for real-time output.

use crate::hal::{AnalogInput, MonotonicClock};
use embedded_hal::delay::DelayNs;
use std::cell::Cell;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::rc::Rc;
use tracing::debug;

/// Virtual nanosecond counter shared by clones
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    elapsed_ns: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose counter already reads `us`
    pub fn starting_at(us: u32) -> Self {
        let clock = Self::new();
        clock.advance_us(us);
        clock
    }

    /// A delay that advances this clock instead of sleeping
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            clock: self.clone(),
        }
    }

    pub fn advance_ns(&self, ns: u64) {
        self.elapsed_ns.set(self.elapsed_ns.get().saturating_add(ns));
    }

    pub fn advance_us(&self, us: u32) {
        self.advance_ns(u64::from(us) * 1_000);
    }
}

impl MonotonicClock for SimClock {
    fn now_us(&self) -> u32 {
        (self.elapsed_ns.get() / 1_000) as u32
    }
}

/// Delay bound to a [`SimClock`]
#[derive(Debug, Clone)]
pub struct SimDelay {
    clock: SimClock,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(us);
    }
}

/// Periodic test signal in volts: `offset + amplitude * sin(2π f t)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineSource {
    pub offset_v: f64,
    pub amplitude_v: f64,
    pub frequency_hz: f64,
}

impl Default for SineSource {
    /// Rectified-mains-like ripple centred in a 5 V range
    fn default() -> Self {
        Self {
            offset_v: 2.5,
            amplitude_v: 2.0,
            frequency_hz: 50.0,
        }
    }
}

impl SineSource {
    /// Sine centred in `[0, reference_voltage]`, swinging over 80% of it
    pub fn centred(reference_voltage: f32, frequency_hz: f64) -> Self {
        let reference = f64::from(reference_voltage);
        Self {
            offset_v: reference / 2.0,
            amplitude_v: reference * 4.0 / 10.0,
            frequency_hz,
        }
    }

    pub fn volts_at(&self, t_us: u32) -> f64 {
        let t = f64::from(t_us) / 1_000_000.0;
        self.offset_v + self.amplitude_v * (TAU * self.frequency_hz * t).sin()
    }
}

/// Converter reading a [`SineSource`] at the time given by a clock
pub struct SimulatedInput<C> {
    source: SineSource,
    clock: C,
    reference_voltage: f64,
    adc_max_code: u16,
    channel: Option<u8>,
}

impl<C: MonotonicClock> SimulatedInput<C> {
    pub fn new(source: SineSource, clock: C, reference_voltage: f32, adc_max_code: u16) -> Self {
        Self {
            source,
            clock,
            reference_voltage: f64::from(reference_voltage),
            adc_max_code,
            channel: None,
        }
    }

    /// Channel passed to the last `configure` call
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    /// Quantize a voltage the way the converter would, clipping at the rails
    pub fn quantize(&self, volts: f64) -> u16 {
        let full_scale = f64::from(self.adc_max_code);
        let code = (volts / self.reference_voltage * full_scale).round();
        code.clamp(0.0, full_scale) as u16
    }
}

impl<C: MonotonicClock> AnalogInput for SimulatedInput<C> {
    type Error = std::convert::Infallible;

    fn configure(&mut self, channel: u8) -> Result<(), Self::Error> {
        debug!("Simulated input configured on channel {}", channel);
        self.channel = Some(channel);
        Ok(())
    }

    fn read(&mut self) -> Result<u16, Self::Error> {
        let volts = self.source.volts_at(self.clock.now_us());
        Ok(self.quantize(volts))
    }
}

/// Fault returned by a [`ScriptedInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFault;

/// Input replaying a fixed script of reads
///
/// Once the script runs out it repeats `fallback`, or faults when there is
/// none.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: VecDeque<Result<u16, SimFault>>,
    fallback: Option<u16>,
    reads: usize,
}

impl ScriptedInput {
    pub fn new(script: Vec<Result<u16, SimFault>>) -> Self {
        Self {
            script: script.into(),
            fallback: None,
            reads: 0,
        }
    }

    /// Input that always reads `code`
    pub fn repeating(code: u16) -> Self {
        Self {
            fallback: Some(code),
            ..Default::default()
        }
    }

    /// Total reads served, faults included
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl AnalogInput for ScriptedInput {
    type Error = SimFault;

    fn read(&mut self) -> Result<u16, Self::Error> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(result) => result,
            None => self.fallback.ok_or(SimFault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_clock_advances_on_delay() {
        let clock = SimClock::starting_at(10);
        let mut delay = clock.delay();
        delay.delay_us(980);
        delay.delay_ns(500);
        delay.delay_ns(500);
        assert_eq!(clock.now_us(), 991);
    }

    #[test]
    fn test_sim_clock_wraps_like_hardware() {
        let clock = SimClock::starting_at(u32::MAX);
        clock.advance_us(2);
        assert_eq!(clock.now_us(), 1);
    }

    #[test]
    fn test_centred_source() {
        let source = SineSource::centred(5.0, 50.0);
        assert_eq!(source, SineSource::default());
        assert!((source.volts_at(5_000) - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_sine_quantization() {
        let clock = SimClock::new();
        let input = SimulatedInput::new(SineSource::default(), clock.clone(), 5.0, 1023);

        assert_eq!(input.quantize(0.0), 0);
        assert_eq!(input.quantize(5.0), 1023);
        assert_eq!(input.quantize(-1.0), 0);
        assert_eq!(input.quantize(7.5), 1023);
        assert_eq!(input.quantize(2.5), 512);
    }

    #[test]
    fn test_sine_follows_clock() {
        let clock = SimClock::new();
        let mut input = SimulatedInput::new(SineSource::default(), clock.clone(), 5.0, 1023);
        assert_eq!(input.channel(), None);
        input.configure(3).unwrap();
        assert_eq!(input.channel(), Some(3));

        // t = 0: offset only
        assert_eq!(input.read(), Ok(512));
        // Quarter period of 50 Hz: peak at 4.5 V
        clock.advance_us(5_000);
        assert_eq!(input.read(), Ok(921));
    }

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::new(vec![Ok(1), Err(SimFault)]);
        assert_eq!(input.read(), Ok(1));
        assert_eq!(input.read(), Err(SimFault));
        assert_eq!(input.read(), Err(SimFault));
        assert_eq!(input.reads(), 3);

        let mut input = ScriptedInput::repeating(7);
        assert_eq!(input.read(), Ok(7));
        assert_eq!(input.read(), Ok(7));
    }
}
