//! Test helpers and fixtures for sonde integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (partition of unity, copies)
//! - `DSP_EPSILON` (1e-4): Spectral estimates (FFT power, band levels)

pub mod tolerances;

use sonde::prelude::*;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Create an unbounded pool with a small allocation granularity.
pub fn test_pool() -> BufferPool {
    BufferPool::new(PoolConfig::with_granularity(32)).expect("Failed to create test pool")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate silence (zero samples).
pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Generate an integer staircase signal [0, 1, 2, ..., n-1] as f32.
///
/// Each sample equals its index, so any misrouted or duplicated frame is
/// visible exactly.
pub fn generate_integer_staircase(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}

/// Copy `samples` into a freshly acquired pool buffer.
pub fn pooled(pool: &BufferPool, samples: &[f32]) -> PoolBuffer {
    let mut buffer = pool.acquire(samples.len()).expect("Failed to acquire buffer");
    buffer
        .get_mut()
        .expect("fresh buffer is unshared")[..samples.len()]
        .copy_from_slice(samples);
    buffer
}

/// Split `samples` into pooled chunks of varying sizes, cycling through
/// `sizes`.
pub fn pooled_chunks(pool: &BufferPool, samples: &[f32], sizes: &[usize]) -> Vec<(PoolBuffer, usize)> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &size in sizes.iter().cycle() {
        if start >= samples.len() {
            break;
        }
        let end = (start + size).min(samples.len());
        chunks.push((pooled(pool, &samples[start..end]), end - start));
        start = end;
    }
    chunks
}
