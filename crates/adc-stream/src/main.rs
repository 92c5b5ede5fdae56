//! ADC Stream - Main Entry Point

mod cli;
mod commands;
mod settings;

use clap::Parser;
use cli::{Cli, Command};
use settings::Settings;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging on stderr; stdout may carry the record stream
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("=== ADC Stream v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Simulate {
            cycles,
            port,
            instant,
            frequency,
        } => {
            // The sampler loop blocks its thread
            tokio::task::spawn_blocking(move || {
                commands::simulate(&settings, cycles, port, instant, frequency)
            })
            .await??;
        }
        Command::Capture { port, output } => {
            commands::capture(&settings, port, output).await?;
        }
        Command::Inspect {
            input,
            offset,
            measurement,
        } => {
            commands::inspect(&settings, input, offset, measurement)?;
        }
    }

    Ok(())
}
