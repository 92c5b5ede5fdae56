//! Command-line interface

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Stream analog samples over serial and inspect captured logs
#[derive(Debug, Parser)]
#[command(name = "adc-stream", version, about)]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sampler against a simulated sine input
    Simulate {
        /// Stop after this many records (default: run until killed)
        #[arg(short = 'n', long)]
        cycles: Option<u64>,

        /// Write records to this serial port instead of stdout
        #[arg(short, long)]
        port: Option<String>,

        /// Use the simulated clock so passes complete instantly
        #[arg(long)]
        instant: bool,

        /// Frequency of the simulated signal (Hz)
        #[arg(long, default_value_t = 50.0)]
        frequency: f64,
    },

    /// Capture records from a serial port until Ctrl-C, then save them as JSON
    Capture {
        /// Serial port (e.g. /dev/ttyACM0, COM3, /dev/cu.usbmodem14101)
        #[arg(short, long)]
        port: Option<String>,

        /// Where to save the measurement log
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a captured log as time/voltage points
    Inspect {
        /// Measurement log to read
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Voltage offset subtracted from every value
        #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
        offset: f64,

        /// Measurement number to print; below 1 prints all
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        measurement: i64,
    },
}
