//! Hardware seams and their host implementations

pub use embedded_hal::delay::DelayNs;
use std::time::{Duration, Instant};

/// A single analog input channel
pub trait AnalogInput {
    /// Converter fault
    type Error: std::fmt::Debug;

    /// Prepare the channel for reads. Called once before the first pass.
    fn configure(&mut self, _channel: u8) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Read one raw code. Codes above full scale are passed through untouched.
    fn read(&mut self) -> Result<u16, Self::Error>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    type Error = T::Error;

    fn configure(&mut self, channel: u8) -> Result<(), Self::Error> {
        (**self).configure(channel)
    }

    fn read(&mut self) -> Result<u16, Self::Error> {
        (**self).read()
    }
}

/// Free-running microsecond counter
///
/// The counter is 32 bits wide and wraps, like a board `micros()`.
pub trait MonotonicClock {
    /// Current counter value in microseconds
    fn now_us(&self) -> u32;
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

/// Host clock counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_us(&self) -> u32 {
        // Truncation is the wrap
        self.epoch.elapsed().as_micros() as u32
    }
}

/// Blocking host delay backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let first = clock.now_us();
        let mut delay = StdDelay;
        delay.delay_us(200);
        let second = clock.now_us();
        assert!(second >= first + 200);
    }
}
