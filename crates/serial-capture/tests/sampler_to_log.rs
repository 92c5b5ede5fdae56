//! Sampler output captured and logged end to end

use adc_sampler::sim::{SimClock, SimulatedInput, SineSource};
use adc_sampler::{LineEnding, OutputMode, Sampler, SamplerConfig};
use serial_capture::{capture_lines, select, MeasurementLog, Selection};
use std::future::pending;
use tokio::io::BufReader;

fn simulated_stream(config: &SamplerConfig, cycles: u64) -> Vec<u8> {
    let clock = SimClock::new();
    let input = SimulatedInput::new(
        SineSource::default(),
        clock.clone(),
        config.reference_voltage,
        config.adc_max_code,
    );
    let delay = clock.delay();

    let mut sampler = Sampler::new(config, input, clock, delay, Vec::new()).unwrap();
    let stats = sampler.run_cycles(cycles).unwrap();
    assert_eq!(stats.cycles, cycles);
    assert_eq!(stats.write_faults, 0);
    sampler.into_writer()
}

#[tokio::test]
async fn test_board_stream_round_trips_through_log() {
    let config = SamplerConfig::default();
    let stream = simulated_stream(&config, 5);

    let log = capture_lines(BufReader::new(stream.as_slice()), 0, pending())
        .await
        .unwrap();

    assert_eq!(log.len(), 5);
    let mut last_start = 0;
    for measurement in &log {
        assert_eq!(measurement.voltages.len(), config.sample_count);
        assert_eq!(measurement.duration_us(), 100 * 980);
        assert!(measurement.start_time >= last_start);
        last_start = measurement.start_time;
        for &v in &measurement.voltages {
            assert!((0.0..=5.0).contains(&v));
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.json");
    log.save(&path).unwrap();
    let reloaded = MeasurementLog::load(&path).unwrap();
    assert_eq!(reloaded, log);

    let series = select(&reloaded, Selection::All, 0.0, &path).unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series[4][0].time_ms, 4.0 * 98.0);
}

#[tokio::test]
async fn test_raw_stream_keeps_codes() {
    let config = SamplerConfig {
        sample_count: 16,
        output_mode: OutputMode::Raw,
        line_ending: LineEnding::Lf,
        ..SamplerConfig::raw_stream()
    };
    let stream = simulated_stream(&config, 2);

    let log = capture_lines(BufReader::new(stream.as_slice()), 1, pending())
        .await
        .unwrap();

    assert_eq!(log.len(), 1);
    let codes = &log.get(1).unwrap().voltages;
    assert_eq!(codes.len(), 16);
    assert!(codes.iter().all(|c| c.fract() == 0.0 && *c <= 1023.0));
}
