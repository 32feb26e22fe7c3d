//! Analysis pipeline integration tests
//!
//! Pooled chunks through the spectrum, filterbank, band monitor and pulse
//! processor, checked end to end.
//!
//! Run with:
//! ```bash
//! cargo test -p sonde --test pipeline_integration
//! ```

#![cfg(feature = "analysis")]

#[path = "helpers/mod.rs"]
mod helpers;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use helpers::tolerances::*;
use helpers::{generate_silence, generate_sine, pooled_chunks, test_pool, TEST_SAMPLE_RATE};
use sonde::analysis::{FftPowerSpectrum, MAX_BANDS};
use sonde::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Filterbank
// =============================================================================

/// Every bin's weights over all bands plus the residual sum to one.
#[test]
fn test_full_table_partition_of_unity() {
    let bank = ThirdOctaveFilterbank::with_defaults(400_000.0, 200_000).unwrap();
    assert_eq!(bank.num_levels(), MAX_BANDS);

    let bins = bank.analysis_length();
    let mut total = vec![0.0f64; bins];
    let mut coeffs = vec![0.0f32; bins];
    for band in 0..bank.num_levels() {
        bank.coeffs(band, &mut coeffs).unwrap();
        for (t, &c) in total.iter_mut().zip(&coeffs) {
            assert!((0.0..=1.0).contains(&c));
            *t += c as f64;
        }
    }
    bank.residual_coeffs(&mut coeffs).unwrap();
    for (t, &c) in total.iter_mut().zip(&coeffs) {
        *t += c as f64;
    }

    for (bin, &t) in total.iter().enumerate() {
        assert!((t - 1.0).abs() < 1e-5, "bin {bin} sums to {t}");
    }
}

/// Below the residual's support the bands alone partition the spectrum.
#[test]
fn test_bands_partition_without_residual() {
    let bank = ThirdOctaveFilterbank::with_defaults(400_000.0, 200_000).unwrap();
    let bins = bank.analysis_length();
    let mut residual = vec![0.0f32; bins];
    bank.residual_coeffs(&mut residual).unwrap();

    let mut total = vec![0.0f64; bins];
    let mut coeffs = vec![0.0f32; bins];
    for band in 0..bank.num_levels() {
        bank.coeffs(band, &mut coeffs).unwrap();
        for (t, &c) in total.iter_mut().zip(&coeffs) {
            *t += c as f64;
        }
    }

    let mut checked = 0;
    for (bin, (&t, &r)) in total.iter().zip(&residual).enumerate() {
        if r == 0.0 {
            assert!((t - 1.0).abs() < 1e-5, "bin {bin} sums to {t}");
            checked += 1;
        }
    }
    assert!(checked > 160_000, "only {checked} bins without residual");
}

/// A pure 1 kHz tone lands in the 1 kHz band at half the squared amplitude.
#[test]
fn test_sine_power_lands_in_its_band() {
    let n = TEST_SAMPLE_RATE as usize;
    let mut block = generate_sine(1000.0, TEST_SAMPLE_RATE, n);
    let mut fft = FftPowerSpectrum::new(n).unwrap();
    fft.transform(&mut block).unwrap();

    let bank = ThirdOctaveFilterbank::with_defaults(TEST_SAMPLE_RATE, n / 2).unwrap();
    assert_eq!(bank.num_levels(), 34);
    let mut levels = vec![0.0; bank.num_levels() + 1];
    bank.calculate(&block[..n / 2], &mut levels);

    assert_eq!(ThirdOctaveFilterbank::band_centre(20), 1000.0);
    assert_abs_diff_eq!(levels[20], 0.5, epsilon = DSP_EPSILON);
    let rest: f32 = levels
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != 20)
        .map(|(_, &l)| l)
        .sum();
    assert!(rest < DSP_EPSILON, "energy outside the band: {rest}");
}

// =============================================================================
// Band Monitor
// =============================================================================

/// One second of silence, then a 1 kHz tone, fed in ragged chunks.
#[test]
fn test_band_monitor_detects_tone_onset() {
    init_tracing();
    let pool = test_pool();
    let config = MonitorConfig {
        frame_len: 4800,
        hop: 2400,
        envelope_time: 0.0,
        onset_window: 1.0,
        onset_ratio: 10.0,
        sine_window: false,
        ..MonitorConfig::new(TEST_SAMPLE_RATE)
    };
    let mut monitor = BandMonitor::new(config).unwrap();

    let mut signal = generate_silence(48_000);
    signal.extend(generate_sine(1000.0, TEST_SAMPLE_RATE, 96_000));

    let mut events = Vec::new();
    let mut analysed = 0;
    for (chunk, frames) in pooled_chunks(&pool, &signal, &[512, 333, 1000]) {
        analysed += monitor.process(&chunk, frames, &mut events).unwrap();
    }

    assert_eq!(analysed, 59);
    assert_eq!(monitor.frames_analysed(), 59);

    // Frame 19 is the first to contain any of the tone.
    assert!(events.iter().all(|e| e.frame >= 19), "events: {events:?}");
    let tone: Vec<&BandOnset> = events.iter().filter(|e| e.band == 20).collect();
    assert_eq!(tone.len(), 1, "events: {events:?}");
    assert_eq!(tone[0].frame, 19);
    assert_eq!(tone[0].centre_hz, 1000.0);
    assert!(tone[0].level > tone[0].threshold);

    monitor.finish();
    assert_eq!(pool.outstanding(), 0);
}

// =============================================================================
// Pulse Processor
// =============================================================================

fn rise_and_decay() -> Vec<f32> {
    let peak = 0.01 * 1.5f32.powi(10);
    (0..600)
        .map(|n| match n {
            0..=299 => 0.01,
            300..=309 => 0.01 * 1.5f32.powi(n - 299),
            _ => (peak * 0.9f32.powi(n - 309)).max(0.01),
        })
        .collect()
}

/// A pulse captured from ragged pooled chunks is recorded and logged.
#[test]
fn test_pulse_processor_records_and_logs() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pulses.log");
    let log = Arc::new(EventLog::open(&path, "pulses").unwrap());

    let pool = test_pool();
    let config = PulseConfig {
        sample_rate: 1000.0,
        onset_window: 0.05,
        envelope_time: 0.005,
        onset_ratio: 4.0,
        decay_ratio: 0.1,
        max_duration: 0.256,
    };
    let mut processor = PulseProcessor::new(config).unwrap().with_log(Arc::clone(&log));

    let signal = rise_and_decay();
    let mut pulses = Vec::new();
    for (chunk, frames) in pooled_chunks(&pool, &signal, &[97, 13, 256]) {
        processor.write(&chunk, frames, &mut pulses).unwrap();
    }

    assert_eq!(pulses.len(), 1, "pulses: {pulses:?}");
    assert_eq!(pulses[0].onset, 299);
    assert_eq!(pulses[0].duration, 33);
    assert_eq!(pulses[0].levels.len(), processor.num_bands() + 1);

    processor.finish();
    assert_eq!(pool.outstanding(), 0);

    let log = Arc::try_unwrap(log).expect("processor released its log handle");
    log.finish().unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(
        contents.contains("MESSAGE: pulse at sample 299: 33 samples"),
        "log: {contents}"
    );
}

// =============================================================================
// Time Slices
// =============================================================================

/// Half-second slices of a 1 kHz tone tile the stream and put its power in
/// the 1 kHz band.
#[test]
fn test_time_slices_of_tone() {
    init_tracing();
    let pool = test_pool();
    let mut processor = TimeSliceProcessor::new(SliceConfig::new(TEST_SAMPLE_RATE)).unwrap();
    assert_eq!(processor.period(), 24000);

    let signal = generate_sine(1000.0, TEST_SAMPLE_RATE, 72000);
    let mut slices = Vec::new();
    for (chunk, frames) in pooled_chunks(&pool, &signal, &[997, 4096, 31]) {
        processor.write(&chunk, frames, &mut slices).unwrap();
    }

    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].start, 12000);
    assert_eq!(slices[1].start, 36000);
    for slice in &slices {
        assert_abs_diff_eq!(slice.sum_1 / 24000.0, 0.5, epsilon = DSP_EPSILON);
        assert_abs_diff_eq!(slice.peak_positive, 1.0, epsilon = DSP_EPSILON);
        assert_abs_diff_eq!(slice.peak_negative, -1.0, epsilon = DSP_EPSILON);
        assert_eq!(slice.levels.len(), processor.num_bands() + 1);
        let total: f32 = slice.levels.iter().sum();
        assert_abs_diff_eq!(total, 0.5, epsilon = 1e-3);
        assert!(slice.levels[20] > 0.45, "levels: {:?}", slice.levels);
    }

    processor.finish();
    assert_eq!(pool.outstanding(), 0);
}

// =============================================================================
// Error Propagation
// =============================================================================

/// Analysis errors convert into the umbrella error through `?`.
#[test]
fn test_analysis_error_converts() {
    fn build() -> Result<ThirdOctaveFilterbank> {
        Ok(ThirdOctaveFilterbank::with_defaults(20.0, 16)?)
    }

    let err = build().unwrap_err();
    assert!(matches!(
        err,
        Error::Analysis(sonde::analysis::Error::NoUsableBands { .. })
    ));
}
