//! Power spectrum of a time-domain block.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::{Error, Result};

/// Turns a block of `N` time samples into `N / 2` power values, written in
/// place over the start of the block.
pub trait SpectralTransform {
    /// Time-domain block length `N`.
    fn block_len(&self) -> usize;

    fn transform(&mut self, block: &mut [f32]) -> Result<()>;

    /// Number of power values produced.
    fn spectrum_len(&self) -> usize {
        self.block_len() / 2
    }
}

/// FFT-based power spectrum, normalised so that a unit-amplitude sine on an
/// exact bin reads 0.5 (its mean power) and a unit DC block reads 1.
pub struct FftPowerSpectrum {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Option<Vec<f32>>,
}

impl FftPowerSpectrum {
    pub fn new(block_len: usize) -> Result<Self> {
        if block_len == 0 || block_len % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "FFT block length must be even and non-zero, got {block_len}"
            )));
        }
        let fft = FftPlanner::new().plan_fft_forward(block_len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Ok(Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); block_len],
            scratch,
            window: None,
        })
    }

    /// Apply [`sine_window`] to every block before transforming.
    pub fn with_sine_window(mut self) -> Self {
        self.window = Some(sine_window(self.buffer.len()));
        self
    }
}

impl SpectralTransform for FftPowerSpectrum {
    fn block_len(&self) -> usize {
        self.buffer.len()
    }

    fn transform(&mut self, block: &mut [f32]) -> Result<()> {
        let n = self.buffer.len();
        if block.len() != n {
            return Err(Error::LengthMismatch {
                expected: n,
                actual: block.len(),
            });
        }

        match &self.window {
            Some(window) => {
                for ((c, &s), &w) in self.buffer.iter_mut().zip(block.iter()).zip(window) {
                    *c = Complex::new(s * w, 0.0);
                }
            }
            None => {
                for (c, &s) in self.buffer.iter_mut().zip(block.iter()) {
                    *c = Complex::new(s, 0.0);
                }
            }
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / (n as f32 * n as f32);
        block[0] = self.buffer[0].norm_sqr() * scale;
        for (out, c) in block[1..n / 2].iter_mut().zip(&self.buffer[1..n / 2]) {
            *out = 2.0 * c.norm_sqr() * scale;
        }
        Ok(())
    }
}

/// Energy-preserving sine window, `sqrt(2) * sin(pi * i / len)`.
pub fn sine_window(len: usize) -> Vec<f32> {
    let norm = std::f64::consts::SQRT_2;
    (0..len)
        .map(|i| (norm * (std::f64::consts::PI * i as f64 / len as f64).sin()) as f32)
        .collect()
}
