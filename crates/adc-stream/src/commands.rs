//! Subcommand implementations

use crate::settings::Settings;
use adc_sampler::hal::{DelayNs, StdDelay, SystemClock};
use adc_sampler::sim::{SimClock, SimulatedInput, SineSource};
use adc_sampler::{AnalogInput, MonotonicClock, Sampler};
use anyhow::Context;
use serial_capture::{select, MeasurementLog, SerialCapture, Selection, TimePoint};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout for writes to a serial port
const PORT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the sampler on a simulated input, writing to stdout or a serial port
pub fn simulate(
    settings: &Settings,
    cycles: Option<u64>,
    port: Option<String>,
    instant: bool,
    frequency_hz: f64,
) -> anyhow::Result<()> {
    let config = &settings.sampler;

    let writer: Box<dyn Write> = match port {
        Some(path) => {
            info!("Writing records to {} at {} baud", path, config.baud_rate);
            let port = tokio_serial::new(path.as_str(), config.baud_rate)
                .timeout(PORT_WRITE_TIMEOUT)
                .open()
                .with_context(|| format!("opening serial port {}", path))?;
            Box::new(port)
        }
        None => Box::new(std::io::stdout()),
    };

    let source = SineSource::centred(config.reference_voltage, frequency_hz);

    if instant {
        let clock = SimClock::new();
        let input = SimulatedInput::new(
            source,
            clock.clone(),
            config.reference_voltage,
            config.adc_max_code,
        );
        let delay = clock.delay();
        drive(Sampler::new(config, input, clock, delay, writer)?, cycles)
    } else {
        let clock = SystemClock::new();
        let input = SimulatedInput::new(source, clock, config.reference_voltage, config.adc_max_code);
        drive(Sampler::new(config, input, clock, StdDelay, writer)?, cycles)
    }
}

fn drive<I, C, D, W>(mut sampler: Sampler<I, C, D, W>, cycles: Option<u64>) -> anyhow::Result<()>
where
    I: AnalogInput,
    C: MonotonicClock,
    D: DelayNs,
    W: Write,
{
    match cycles {
        Some(cycles) => {
            let stats = sampler.run_cycles(cycles)?;
            info!(
                "Sent {} of {} records ({} read faults)",
                stats.cycles - stats.write_faults,
                stats.cycles,
                stats.read_faults
            );
            Ok(())
        }
        None => match sampler.run()? {},
    }
}

/// Capture from the serial port until Ctrl-C and save the log
pub async fn capture(
    settings: &Settings,
    port: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = settings.capture.clone();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(output) = output {
        config.output_path = output;
    }
    let output_path = config.output_path.clone();

    let capture = SerialCapture::new(config);
    info!("Press Ctrl-C to stop the capture");
    let log = capture
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    log.save(&output_path)
        .with_context(|| format!("saving {}", output_path.display()))?;
    Ok(())
}

/// Print the selected measurements of a log as CSV points
pub fn inspect(
    settings: &Settings,
    input: Option<PathBuf>,
    offset: f64,
    measurement: i64,
) -> anyhow::Result<()> {
    let path = input.unwrap_or_else(|| settings.capture.output_path.clone());
    let log = MeasurementLog::load(&path)
        .with_context(|| format!("reading {}", path.display()))?;

    let selection = Selection::from_number(measurement);
    let series = select(&log, selection, offset, &path)?;

    let stdout = std::io::stdout();
    write_series(&mut stdout.lock(), selection, &series)?;
    Ok(())
}

/// `measurement,time_ms,voltage` rows, one per point
fn write_series<W: Write>(
    out: &mut W,
    selection: Selection,
    series: &[Vec<TimePoint>],
) -> std::io::Result<()> {
    writeln!(out, "measurement,time_ms,voltage")?;
    for (index, points) in series.iter().enumerate() {
        let number = match selection {
            Selection::All => index + 1,
            Selection::One(number) => number,
        };
        for point in points {
            writeln!(out, "{},{:.3},{}", number, point.time_ms, point.voltage)?;
        }
    }
    out.flush()
}
