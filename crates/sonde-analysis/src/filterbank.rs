//! Third-octave band levels from a power spectrum.
//!
//! Bands follow the nominal IEC third-octave series from 10 Hz to 160 kHz.
//! Neighbouring bands cross over smoothly around the edge between them: over
//! a transition of half-width `delta` the lower band's weight falls as
//! `cos^2((1 + phi(p)) * pi / 4)` and the upper band takes the remainder,
//! where `p` is the normalised distance from the edge and `phi` applies
//! `p -> sin(p * pi / 2)` `shape_order` times. Because each band's weight is
//! the difference of two consecutive crossovers, the weights of all bands
//! plus the residual slot sum to exactly one at every bin.
//!
//! Weights are stored sparsely (each band only covers its own bins and the
//! two transitions around it), so [`ThirdOctaveFilterbank::calculate`] costs
//! roughly two multiply-adds per spectrum bin.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::ops::Range;

use crate::{Error, Result};

/// Size of the full band table.
pub const MAX_BANDS: usize = 43;

/// Nominal centre frequencies in Hz.
pub const BAND_CENTRES: [f64; MAX_BANDS] = [
    10.0, 12.5, 16.0, 20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0,
    315.0, 400.0, 500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0,
    5000.0, 6300.0, 8000.0, 10000.0, 12500.0, 16000.0, 20000.0, 25000.0, 31500.0, 40000.0,
    50000.0, 63000.0, 80000.0, 100000.0, 125000.0, 160000.0,
];

/// Edge between band `i` and band `i + 1`, in Hz. The final entry is the
/// upper edge of the band above the table and only sets the width of the
/// last transition.
pub const BAND_EDGES: [f64; MAX_BANDS + 1] = [
    11.2, 14.1, 17.8, 22.4, 28.2, 35.5, 44.7, 56.2, 70.8, 89.1, 112.0, 141.0, 178.0, 224.0, 282.0,
    355.0, 447.0, 562.0, 708.0, 891.0, 1120.0, 1410.0, 1780.0, 2240.0, 2820.0, 3550.0, 4470.0,
    5620.0, 7080.0, 8910.0, 11200.0, 14100.0, 17800.0, 22400.0, 28200.0, 35500.0, 44700.0,
    56200.0, 70800.0, 89100.0, 112000.0, 141000.0, 178000.0, 224000.0,
];

/// Default `bandwidth_factor`.
pub const DEFAULT_BANDWIDTH_FACTOR: f64 = 0.4;

/// Default `shape_order`.
pub const DEFAULT_SHAPE_ORDER: u32 = 3;

#[derive(Debug, Clone)]
struct BandWeights {
    start: usize,
    weights: Vec<f32>,
}

impl BandWeights {
    fn range(&self) -> Range<usize> {
        self.start..self.start + self.weights.len()
    }

    #[inline]
    fn dot(&self, spectrum: &[f32]) -> f32 {
        let bins = &spectrum[self.range()];
        let sum: f64 = bins
            .iter()
            .zip(&self.weights)
            .map(|(&s, &w)| f64::from(s) * f64::from(w))
            .sum();
        sum as f32
    }

    fn copy_into(&self, out: &mut [f32]) {
        out.fill(0.0);
        out[self.range()].copy_from_slice(&self.weights);
    }
}

/// Crossover between two neighbouring bands.
#[derive(Debug, Clone, Copy)]
struct Transition {
    edge: f64,
    delta: f64,
}

impl Transition {
    fn new(index: usize, bandwidth_factor: f64) -> Self {
        let edge = BAND_EDGES[index];
        let next = BAND_EDGES[index + 1];
        Self {
            edge,
            delta: 2.0 * bandwidth_factor * ((edge * next).sqrt() - edge),
        }
    }

    /// Weight of everything below this edge at frequency `f`.
    fn below(&self, f: f64, shape_order: u32) -> f64 {
        if self.delta <= 0.0 {
            return if f < self.edge {
                1.0
            } else if f > self.edge {
                0.0
            } else {
                0.5
            };
        }
        let p = (f - self.edge) / self.delta;
        if p <= -1.0 {
            1.0
        } else if p >= 1.0 {
            0.0
        } else {
            let t = (1.0 + phi(p, shape_order)) * FRAC_PI_4;
            let c = t.cos();
            c * c
        }
    }

    fn lowest(&self) -> f64 {
        self.edge - self.delta
    }

    fn highest(&self) -> f64 {
        self.edge + self.delta
    }
}

#[inline]
fn phi(mut p: f64, order: u32) -> f64 {
    for _ in 0..order {
        p = (p * FRAC_PI_2).sin();
    }
    p
}

/// Number of bands whose nominal upper edge (`centre * 2^(1/6)`) lies below
/// Nyquist.
pub fn usable_bands(sample_rate: f64) -> usize {
    let nyquist = sample_rate / 2.0;
    let half_band = 2f64.powf(1.0 / 6.0);
    BAND_CENTRES
        .iter()
        .take_while(|&&centre| centre * half_band < nyquist)
        .count()
}

#[derive(Debug, Clone)]
pub struct ThirdOctaveFilterbank {
    sample_rate: f64,
    analysis_length: usize,
    bandwidth_factor: f64,
    shape_order: u32,
    bands: Vec<BandWeights>,
    residual: BandWeights,
}

impl ThirdOctaveFilterbank {
    /// Build band weights for a spectrum of `analysis_length` bins spanning
    /// 0 Hz to `sample_rate / 2`.
    ///
    /// `bandwidth_factor` must lie in `[0, 0.5)`: 0 gives brick-wall bands,
    /// larger values widen the crossovers. `shape_order` sets how steep the
    /// crossover is (0 is a plain cosine crossfade).
    pub fn new(
        sample_rate: f64,
        analysis_length: usize,
        bandwidth_factor: f64,
        shape_order: u32,
    ) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate must be positive, got {sample_rate}"
            )));
        }
        if analysis_length == 0 {
            return Err(Error::InvalidConfig(
                "analysis_length must be at least one bin".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&bandwidth_factor) {
            return Err(Error::InvalidConfig(format!(
                "bandwidth_factor must be in [0, 0.5), got {bandwidth_factor}"
            )));
        }

        let n = usable_bands(sample_rate);
        if n == 0 {
            return Err(Error::NoUsableBands { sample_rate });
        }

        let bin_width = sample_rate / (2.0 * analysis_length as f64);
        let transitions: Vec<Transition> = (0..n)
            .map(|i| Transition::new(i, bandwidth_factor))
            .collect();

        // Transition bounds are always positive frequencies.
        let first_bin = |f: f64| ((f / bin_width).ceil() as usize).min(analysis_length);
        let end_bin = |f: f64| ((f / bin_width).floor() as usize + 1).min(analysis_length);
        let bin_freq = |k: usize| k as f64 * bin_width;

        let mut bands = Vec::with_capacity(n);
        for (i, upper) in transitions.iter().enumerate() {
            let lower = i.checked_sub(1).map(|j| transitions[j]);
            let start = lower.map_or(0, |t| first_bin(t.lowest()));
            let end = end_bin(upper.highest()).max(start);
            let weights = (start..end)
                .map(|k| {
                    let f = bin_freq(k);
                    let w = upper.below(f, shape_order)
                        - lower.map_or(0.0, |t| t.below(f, shape_order));
                    w.clamp(0.0, 1.0) as f32
                })
                .collect();
            bands.push(BandWeights { start, weights });
        }

        let last = transitions[n - 1];
        let start = first_bin(last.lowest());
        let residual = BandWeights {
            start,
            weights: (start..analysis_length)
                .map(|k| (1.0 - last.below(bin_freq(k), shape_order)).clamp(0.0, 1.0) as f32)
                .collect(),
        };

        tracing::debug!(
            sample_rate,
            analysis_length,
            bands = n,
            bandwidth_factor,
            shape_order,
            "third-octave filterbank ready"
        );

        Ok(Self {
            sample_rate,
            analysis_length,
            bandwidth_factor,
            shape_order,
            bands,
            residual,
        })
    }

    /// Filterbank with the default crossover shape.
    pub fn with_defaults(sample_rate: f64, analysis_length: usize) -> Result<Self> {
        Self::new(
            sample_rate,
            analysis_length,
            DEFAULT_BANDWIDTH_FACTOR,
            DEFAULT_SHAPE_ORDER,
        )
    }

    /// Number of usable bands `n`. [`calculate`](Self::calculate) writes
    /// `n + 1` values.
    pub fn num_levels(&self) -> usize {
        self.bands.len()
    }

    /// Nominal centre of table band `index`.
    ///
    /// # Panics
    ///
    /// If `index >= MAX_BANDS`.
    pub fn band_centre(index: usize) -> f64 {
        assert!(index < MAX_BANDS, "band index {index} outside the {MAX_BANDS}-band table");
        BAND_CENTRES[index]
    }

    /// Edge between table bands `index` and `index + 1`.
    ///
    /// # Panics
    ///
    /// If `index >= MAX_BANDS`.
    pub fn band_edge(index: usize) -> f64 {
        assert!(index < MAX_BANDS, "band index {index} outside the {MAX_BANDS}-band table");
        BAND_EDGES[index]
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn analysis_length(&self) -> usize {
        self.analysis_length
    }

    pub fn bandwidth_factor(&self) -> f64 {
        self.bandwidth_factor
    }

    pub fn shape_order(&self) -> u32 {
        self.shape_order
    }

    /// Centre frequency of spectrum bin `bin`.
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate / (2.0 * self.analysis_length as f64)
    }

    /// Bins where band `index` has non-zero support.
    pub fn band_bins(&self, index: usize) -> Result<Range<usize>> {
        Ok(self.band(index)?.range())
    }

    /// Copy band `index`'s weights over all `analysis_length` bins into `out`.
    pub fn coeffs(&self, index: usize, out: &mut [f32]) -> Result<()> {
        let band = self.band(index)?;
        self.check_len(out.len())?;
        band.copy_into(out);
        Ok(())
    }

    /// Copy the residual weights (energy above the last usable band) into
    /// `out`.
    pub fn residual_coeffs(&self, out: &mut [f32]) -> Result<()> {
        self.check_len(out.len())?;
        self.residual.copy_into(out);
        Ok(())
    }

    /// Weighted band sums of a power spectrum. `results[i]` holds band `i`
    /// and `results[n]` the energy not assigned to any band.
    ///
    /// # Panics
    ///
    /// If `spectrum` is not `analysis_length` long or `results` is not
    /// `num_levels() + 1` long.
    pub fn calculate(&self, spectrum: &[f32], results: &mut [f32]) {
        assert_eq!(
            spectrum.len(),
            self.analysis_length,
            "spectrum length must match the analysis length"
        );
        assert_eq!(
            results.len(),
            self.bands.len() + 1,
            "results must hold one value per band plus the residual"
        );

        for (out, band) in results.iter_mut().zip(&self.bands) {
            *out = band.dot(spectrum);
        }
        results[self.bands.len()] = self.residual.dot(spectrum);
    }

    fn band(&self, index: usize) -> Result<&BandWeights> {
        self.bands.get(index).ok_or(Error::BandOutOfRange {
            index,
            available: self.bands.len(),
        })
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.analysis_length {
            return Err(Error::LengthMismatch {
                expected: self.analysis_length,
                actual,
            });
        }
        Ok(())
    }
}
