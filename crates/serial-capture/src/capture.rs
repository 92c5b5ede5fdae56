//! Serial capture task
//!
//! Opening the port resets most boards, which then print noise while they
//! boot. The capture waits out a settle delay, drops whatever arrived, skips
//! a configurable number of lines, and then logs every record until the
//! shutdown future resolves or the stream ends.

use crate::error::CaptureError;
use crate::log::MeasurementLog;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Serial device (e.g. "/dev/ttyACM0", "COM3", "/dev/cu.usbmodem14101")
    pub port: String,
    /// Baud rate, must match the sampler
    pub baud_rate: u32,
    /// Wait after opening the port before reading (ms)
    pub settle_ms: u64,
    /// Lines dropped after the settle delay
    pub discard_lines: usize,
    /// Where the measurement log is saved
    pub output_path: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: adc_sampler::defaults::BAUD_RATE,
            settle_ms: 4000,
            discard_lines: 0,
            output_path: PathBuf::from("output-files/output.json"),
        }
    }
}

impl CaptureConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Captures records from a serial port
pub struct SerialCapture {
    config: CaptureConfig,
}

impl SerialCapture {
    pub fn new(config: CaptureConfig) -> Self {
        info!("Creating serial capture for device: {}", config.port);
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Open the port, wait for the board to settle and drop the boot noise
    pub async fn open(&self) -> Result<SerialStream, CaptureError> {
        info!(
            "Opening {} at {} baud",
            self.config.port, self.config.baud_rate
        );
        let port = tokio_serial::new(self.config.port.as_str(), self.config.baud_rate)
            .open_native_async()?;

        debug!("Waiting {:?} for the board to settle", self.config.settle_delay());
        tokio::time::sleep(self.config.settle_delay()).await;
        port.clear(ClearBuffer::Input)?;

        Ok(port)
    }

    /// Capture until `shutdown` resolves or the port closes
    pub async fn run<F>(&self, shutdown: F) -> Result<MeasurementLog, CaptureError>
    where
        F: Future<Output = ()>,
    {
        let port = self.open().await?;
        capture_lines(BufReader::new(port), self.config.discard_lines, shutdown).await
    }
}

/// Read record lines from `reader` into a log
///
/// The first `discard_lines` lines are dropped. Lines that do not parse are
/// logged and skipped. A read error ends the capture but keeps what was
/// already logged.
pub async fn capture_lines<R, F>(
    reader: R,
    discard_lines: usize,
    shutdown: F,
) -> Result<MeasurementLog, CaptureError>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut log = MeasurementLog::new();
    let mut received = 0usize;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Buffered lines are drained before shutdown is honored
            biased;

            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    received += 1;
                    if received <= discard_lines {
                        debug!("Discarding line {}", received);
                    } else {
                        match log.push_line(&line) {
                            Ok(measurement) => debug!(
                                "Read {}: {} values",
                                received - discard_lines,
                                measurement.voltages.len()
                            ),
                            Err(e) => warn!("Skipping line {}: {}", received, e),
                        }
                    }
                }
                Ok(None) => {
                    info!("Serial stream closed");
                    break;
                }
                Err(e) => {
                    error!("Serial read failed: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Capture stopped");
                break;
            }
        }
    }

    info!("Captured {} measurements", log.len());
    Ok(log)
}
