//! Sampler-Transmitter loop
//!
//! Acquire, scale, transmit, repeat. Faults are logged and the loop carries
//! on; nothing short of a reset stops [`Sampler::run`].

use crate::config::{LineEnding, OutputMode, SamplerConfig};
use crate::error::SamplerError;
use crate::hal::{AnalogInput, MonotonicClock};
use crate::record::{AcquisitionWindow, Record};
use crate::session::AcquisitionSession;
use embedded_hal::delay::DelayNs;
use std::io::Write;
use tracing::{debug, info, warn};

/// Writes records to a byte channel
///
/// Each record is formatted into a line buffer sized once at construction and
/// handed to the channel in a single `write_all`.
pub struct Transmitter<W> {
    writer: W,
    line_ending: LineEnding,
    line: Vec<u8>,
    records_sent: u64,
}

impl<W: Write> Transmitter<W> {
    pub fn new(writer: W, line_ending: LineEnding) -> Self {
        Self::with_capacity(writer, line_ending, 0)
    }

    /// Transmitter whose line buffer holds `capacity` bytes without growing
    pub fn with_capacity(writer: W, line_ending: LineEnding, capacity: usize) -> Self {
        Self {
            writer,
            line_ending,
            line: Vec::with_capacity(capacity),
            records_sent: 0,
        }
    }

    /// Write one record with its terminator and flush the channel
    ///
    /// If the channel fails after taking part of the line, the terminator is
    /// sent on its own so the next record starts on a fresh line.
    pub fn transmit(&mut self, record: &Record<'_>) -> Result<(), SamplerError> {
        self.line.clear();
        record.write_to(&mut self.line, self.line_ending)?;

        let mut tally = Tally {
            inner: &mut self.writer,
            accepted: 0,
        };
        if let Err(e) = tally.write_all(&self.line) {
            let accepted = tally.accepted;
            if accepted > 0 {
                debug!(
                    "Record cut after {} of {} bytes, closing the line",
                    accepted,
                    self.line.len()
                );
                if let Err(err) = self
                    .writer
                    .write_all(self.line_ending.as_str().as_bytes())
                    .and_then(|()| self.writer.flush())
                {
                    debug!("Line terminator not sent: {}", err);
                }
            }
            return Err(e.into());
        }

        self.writer.flush()?;
        self.records_sent += 1;
        Ok(())
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    /// Capacity of the line buffer
    pub fn line_capacity(&self) -> usize {
        self.line.capacity()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Counts the bytes the channel actually took
struct Tally<'a, W> {
    inner: &'a mut W,
    accepted: usize,
}

impl<W: Write> Write for Tally<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.accepted += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Outcome of one full cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub window: AcquisitionWindow,
    /// Reads that failed during the pass
    pub read_faults: usize,
}

/// Totals over several cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub read_faults: u64,
    pub write_faults: u64,
}

/// Single-threaded Sampler-Transmitter
///
/// Owns the session, the hardware seams and the output channel. The channel
/// is expected to be opened at [`SamplerConfig::baud_rate`] by the caller.
pub struct Sampler<I, C, D, W> {
    session: AcquisitionSession,
    input: I,
    clock: C,
    delay: D,
    transmitter: Transmitter<W>,
    input_channel: u8,
    baud_rate: u32,
    initialized: bool,
    last_start_us: Option<u32>,
}

impl<I, C, D, W> Sampler<I, C, D, W>
where
    I: AnalogInput,
    C: MonotonicClock,
    D: DelayNs,
    W: Write,
{
    /// Create a sampler, validating the configuration and allocating buffers
    pub fn new(
        config: &SamplerConfig,
        input: I,
        clock: C,
        delay: D,
        writer: W,
    ) -> Result<Self, SamplerError> {
        let session = AcquisitionSession::new(config)?;
        info!(
            "Creating sampler: {} samples every pass, {} us hold, {:?} output",
            config.sample_count, config.sample_delay_us, config.output_mode
        );

        Ok(Self {
            session,
            input,
            clock,
            delay,
            transmitter: Transmitter::with_capacity(
                writer,
                config.line_ending,
                config.max_line_bytes(),
            ),
            input_channel: config.input_channel,
            baud_rate: config.baud_rate,
            initialized: false,
            last_start_us: None,
        })
    }

    /// Configure the input channel. Runs once; later calls do nothing.
    pub fn initialize(&mut self) -> Result<(), SamplerError> {
        if self.initialized {
            return Ok(());
        }

        info!(
            "Initializing sampler on channel {} at {} baud",
            self.input_channel, self.baud_rate
        );

        self.input
            .configure(self.input_channel)
            .map_err(|e| SamplerError::InputError(format!("{:?}", e)))?;

        self.initialized = true;
        Ok(())
    }

    /// Acquire one pass, scale it if configured, and transmit it
    ///
    /// Read faults are counted in the report; a write fault is returned.
    pub fn run_cycle(&mut self) -> Result<CycleReport, SamplerError> {
        self.initialize()?;

        let pass = self
            .session
            .acquire(&mut self.input, &self.clock, &mut self.delay);

        if let Some(last) = self.last_start_us {
            if pass.window.start_us < last {
                debug!("Microsecond counter wrapped ({} -> {})", last, pass.window.start_us);
            }
        }
        self.last_start_us = Some(pass.window.start_us);

        if self.session.output_mode() == OutputMode::Voltage {
            self.session.scale();
        }

        if let Some(record) = self.session.record() {
            self.transmitter.transmit(&record)?;
        }

        Ok(CycleReport {
            window: pass.window,
            read_faults: pass.read_faults,
        })
    }

    /// Run `cycles` cycles, ignoring faults the way [`Sampler::run`] does
    pub fn run_cycles(&mut self, cycles: u64) -> Result<RunStats, SamplerError> {
        self.initialize()?;

        let mut stats = RunStats::default();
        for _ in 0..cycles {
            match self.run_cycle() {
                Ok(report) => stats.read_faults += report.read_faults as u64,
                Err(e) => {
                    stats.write_faults += 1;
                    warn!("Cycle {} not transmitted: {}", stats.cycles + 1, e);
                }
            }
            stats.cycles += 1;
        }
        Ok(stats)
    }

    /// Sample and transmit forever
    ///
    /// Fails only if the input cannot be configured; after that every fault is
    /// logged and the next pass starts immediately.
    pub fn run(&mut self) -> Result<std::convert::Infallible, SamplerError> {
        self.initialize()?;
        info!("Starting acquisition loop");

        loop {
            if let Err(e) = self.run_cycle() {
                warn!("Record not transmitted: {}", e);
            }
        }
    }

    pub fn session(&self) -> &AcquisitionSession {
        &self.session
    }

    pub fn transmitter(&self) -> &Transmitter<W> {
        &self.transmitter
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Release the output channel
    pub fn into_writer(self) -> W {
        self.transmitter.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ParsedRecord, RecordValues};
    use crate::sim::{ScriptedInput, SimClock, SimDelay, SimFault};
    use proptest::prelude::*;
    use std::io;

    /// Channel that fails every other write call
    struct FlakyWriter {
        calls: usize,
        accepted: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "tx buffer full"));
            }
            self.accepted.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sampler_with(
        config: &SamplerConfig,
        input: ScriptedInput,
    ) -> Sampler<ScriptedInput, SimClock, SimDelay, Vec<u8>> {
        let clock = SimClock::new();
        let delay = clock.delay();
        Sampler::new(config, input, clock, delay, Vec::new()).unwrap()
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_single_cycle_output() {
        let config = SamplerConfig {
            sample_count: 4,
            sample_delay_us: 1000,
            decimal_places: 4,
            line_ending: LineEnding::Lf,
            ..Default::default()
        };
        let input = ScriptedInput::new(vec![Ok(0), Ok(511), Ok(1023), Ok(200)]);
        let mut sampler = sampler_with(&config, input);

        let report = sampler.run_cycle().unwrap();
        assert_eq!(report.window, AcquisitionWindow::new(0, 4000));

        let out = sampler.into_writer();
        assert_eq!(out, b"0,4000,0.0000,2.4976,5.0000,0.9775\n");
    }

    #[test]
    fn test_default_config_prints_two_decimals_crlf() {
        let config = SamplerConfig {
            sample_count: 2,
            ..Default::default()
        };
        let mut sampler = sampler_with(&config, ScriptedInput::repeating(1023));
        sampler.run_cycle().unwrap();

        let out = String::from_utf8(sampler.into_writer()).unwrap();
        assert_eq!(out, "0,1960,5.00,5.00\r\n");
    }

    #[test]
    fn test_initialize_runs_once() {
        let mut sampler = sampler_with(&SamplerConfig::default(), ScriptedInput::repeating(0));
        assert!(!sampler.is_initialized());
        sampler.initialize().unwrap();
        sampler.initialize().unwrap();
        assert!(sampler.is_initialized());
    }

    #[test]
    fn test_cycles_are_back_to_back() {
        let config = SamplerConfig {
            sample_count: 10,
            output_mode: OutputMode::Raw,
            line_ending: LineEnding::Lf,
            ..Default::default()
        };
        let mut sampler = sampler_with(&config, ScriptedInput::repeating(3));
        let stats = sampler.run_cycles(3).unwrap();
        assert_eq!(stats.cycles, 3);
        assert_eq!(sampler.transmitter().records_sent(), 3);

        let lines = lines(&sampler.into_writer());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0,9800,"));
        assert!(lines[1].starts_with("9800,19600,"));
        assert!(lines[2].starts_with("19600,29400,"));
    }

    #[test]
    fn test_read_faults_do_not_stop_loop() {
        let config = SamplerConfig {
            sample_count: 2,
            output_mode: OutputMode::Raw,
            line_ending: LineEnding::Lf,
            ..Default::default()
        };
        let input = ScriptedInput::new(vec![Err(SimFault), Ok(9), Ok(8), Err(SimFault)]);
        let mut sampler = sampler_with(&config, input);

        let stats = sampler.run_cycles(2).unwrap();
        assert_eq!(stats.read_faults, 2);
        assert_eq!(stats.write_faults, 0);

        let lines = lines(&sampler.into_writer());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",0,9"));
        assert!(lines[1].ends_with(",8,9"));
    }

    #[test]
    fn test_write_faults_do_not_stop_loop() {
        let config = SamplerConfig {
            sample_count: 3,
            output_mode: OutputMode::Raw,
            line_ending: LineEnding::Lf,
            ..Default::default()
        };
        let clock = SimClock::new();
        let delay = clock.delay();
        let writer = FlakyWriter {
            calls: 0,
            accepted: Vec::new(),
        };
        let mut sampler =
            Sampler::new(&config, ScriptedInput::repeating(1), clock, delay, writer).unwrap();

        let stats = sampler.run_cycles(4).unwrap();
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.write_faults, 2);
        assert_eq!(
            sampler.transmitter().records_sent(),
            stats.cycles - stats.write_faults
        );

        // Only whole records reach the channel, one per line
        let lines = lines(&sampler.into_writer().accepted);
        assert_eq!(lines, vec!["0,2940,1,1,1", "5880,8820,1,1,1"]);
        for line in &lines {
            assert_eq!(line.split(',').count(), 2 + config.sample_count);
        }
    }

    /// Channel taking at most `chunk` bytes per call and failing one call
    struct ShortWriter {
        chunk: usize,
        fail_on_call: usize,
        calls: usize,
        accepted: Vec<u8>,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls == self.fail_on_call {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "tx timeout"));
            }
            let n = buf.len().min(self.chunk);
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cut_record_does_not_merge_with_next() {
        let config = SamplerConfig {
            sample_count: 3,
            output_mode: OutputMode::Raw,
            line_ending: LineEnding::Lf,
            ..Default::default()
        };
        let clock = SimClock::new();
        let delay = clock.delay();
        // "0,2940,7,7,7\n" goes out 4 bytes at a time; the second chunk fails
        let writer = ShortWriter {
            chunk: 4,
            fail_on_call: 2,
            calls: 0,
            accepted: Vec::new(),
        };
        let mut sampler =
            Sampler::new(&config, ScriptedInput::repeating(7), clock, delay, writer).unwrap();

        let stats = sampler.run_cycles(2).unwrap();
        assert_eq!(stats.write_faults, 1);
        assert_eq!(sampler.transmitter().records_sent(), 1);

        let out = String::from_utf8(sampler.into_writer().accepted).unwrap();
        assert_eq!(out, "0,29\n2940,5880,7,7,7\n");

        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].split(',').count() < 2 + config.sample_count);
        let record = ParsedRecord::parse(lines[1]).unwrap();
        assert_eq!(record.window, AcquisitionWindow::new(2940, 5880));
        assert_eq!(record.values, vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn test_transmitter_sends_one_write_per_record() {
        let config = SamplerConfig {
            sample_count: 4,
            decimal_places: 4,
            ..Default::default()
        };
        let mut sampler = sampler_with(&config, ScriptedInput::repeating(1023));
        let capacity = sampler.transmitter().line_capacity();
        assert!(capacity >= config.max_line_bytes());

        sampler.run_cycles(3).unwrap();
        // No record outgrew the line buffer
        assert_eq!(sampler.transmitter().line_capacity(), capacity);

        let codes = [0u16, 1023];
        let record = Record::new(AcquisitionWindow::new(5, 9), RecordValues::Raw(&codes));
        let writer = ShortWriter {
            chunk: usize::MAX,
            fail_on_call: 0,
            calls: 0,
            accepted: Vec::new(),
        };
        let mut transmitter = Transmitter::new(writer, LineEnding::CrLf);
        transmitter.transmit(&record).unwrap();
        transmitter.transmit(&record).unwrap();
        assert_eq!(transmitter.records_sent(), 2);

        let writer = transmitter.into_inner();
        assert_eq!(writer.calls, 2);
        assert_eq!(writer.accepted, b"5,9,0,1023\r\n5,9,0,1023\r\n");
    }

    proptest! {
        #[test]
        fn prop_records_are_ordered_and_complete(
            sample_count in 1usize..50,
            sample_delay_us in 0u32..2000,
            cycles in 1u64..6,
        ) {
            let config = SamplerConfig {
                sample_count,
                sample_delay_us,
                line_ending: LineEnding::Lf,
                ..Default::default()
            };
            let mut sampler = sampler_with(&config, ScriptedInput::repeating(700));
            sampler.run_cycles(cycles).unwrap();

            let lines = lines(&sampler.into_writer());
            prop_assert_eq!(lines.len() as u64, cycles);

            let mut last_start = 0u32;
            for line in &lines {
                let fields: Vec<&str> = line.split(',').collect();
                prop_assert_eq!(fields.len(), 2 + sample_count);
                let start: u32 = fields[0].parse().unwrap();
                let end: u32 = fields[1].parse().unwrap();
                prop_assert!(end >= start);
                prop_assert!(start >= last_start);
                last_start = start;
            }
        }
    }
}
