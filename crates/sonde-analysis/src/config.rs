//! Configuration for the band monitor, pulse processor and time slicer.

use crate::filterbank::{DEFAULT_BANDWIDTH_FACTOR, DEFAULT_SHAPE_ORDER};
use crate::{Error, Result};

/// Configuration for a [`BandMonitor`](crate::BandMonitor).
///
/// Level tracking runs once per analysis frame, so the envelope and onset
/// time constants are converted at the frame rate `sample_rate / hop`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub sample_rate: f64,
    /// FFT block length in samples; the filterbank sees `frame_len / 2` bins.
    pub frame_len: usize,
    /// Samples between the starts of consecutive frames.
    pub hop: usize,
    pub bandwidth_factor: f64,
    pub shape_order: u32,
    /// Release time of each band's envelope, in seconds.
    pub envelope_time: f64,
    /// Span of the noise floor minimum, in seconds.
    pub onset_window: f64,
    /// A band fires when its level exceeds `onset_ratio` times its floor.
    pub onset_ratio: f32,
    /// Apply a sine window before the FFT.
    pub sine_window: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            frame_len: 4096,
            hop: 2048,
            bandwidth_factor: DEFAULT_BANDWIDTH_FACTOR,
            shape_order: DEFAULT_SHAPE_ORDER,
            envelope_time: 0.5,
            onset_window: 5.0,
            onset_ratio: 4.0,
            sine_window: true,
        }
    }
}

impl MonitorConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.sample_rate / self.hop as f64
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} must be positive",
                self.sample_rate
            )));
        }
        if self.frame_len < 2 || self.frame_len % 2 != 0 {
            return Err(Error::InvalidConfig(format!(
                "frame_len {} must be even and at least 2",
                self.frame_len
            )));
        }
        if self.hop == 0 || self.hop > self.frame_len {
            return Err(Error::InvalidConfig(format!(
                "hop {} must be in 1..={}",
                self.hop, self.frame_len
            )));
        }
        if !(0.0..0.5).contains(&self.bandwidth_factor) {
            return Err(Error::InvalidConfig(format!(
                "bandwidth_factor {} must be in [0, 0.5)",
                self.bandwidth_factor
            )));
        }
        Ok(())
    }
}

/// Configuration for a [`PulseProcessor`](crate::PulseProcessor).
#[derive(Debug, Clone)]
pub struct PulseConfig {
    pub sample_rate: f64,
    /// Span of the noise floor minimum (`Tw`), in seconds.
    pub onset_window: f64,
    /// Envelope release time (`Tc`), in seconds.
    pub envelope_time: f64,
    /// A pulse starts when the envelope exceeds `onset_ratio` times the floor.
    pub onset_ratio: f32,
    /// A pulse ends when the envelope falls below `decay_ratio` times its
    /// value at the latest positive peak.
    pub decay_ratio: f32,
    /// Pulses are cut off after this many seconds.
    pub max_duration: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            onset_window: 0.1,
            envelope_time: 0.005,
            onset_ratio: 4.0,
            decay_ratio: 0.1,
            max_duration: 0.5,
        }
    }
}

impl PulseConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Maximum pulse length in samples.
    pub fn max_duration_samples(&self) -> usize {
        (self.max_duration * self.sample_rate).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} must be positive",
                self.sample_rate
            )));
        }
        if self.max_duration_samples() < 2 {
            return Err(Error::InvalidConfig(format!(
                "max_duration {} s is shorter than two samples",
                self.max_duration
            )));
        }
        if !(0.0..1.0).contains(&self.decay_ratio) {
            return Err(Error::InvalidConfig(format!(
                "decay_ratio {} must be in [0, 1)",
                self.decay_ratio
            )));
        }
        Ok(())
    }
}

/// Configuration for a [`TimeSliceProcessor`](crate::TimeSliceProcessor).
#[derive(Debug, Clone)]
pub struct SliceConfig {
    pub sample_rate: f64,
    /// Length of one slice, in seconds. Band levels are taken over twice
    /// this span.
    pub slice_period: f64,
    pub bandwidth_factor: f64,
    pub shape_order: u32,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            slice_period: 0.5,
            bandwidth_factor: DEFAULT_BANDWIDTH_FACTOR,
            shape_order: DEFAULT_SHAPE_ORDER,
        }
    }
}

impl SliceConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Slice period in whole samples.
    pub fn period_samples(&self) -> usize {
        (self.slice_period * self.sample_rate).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} must be positive",
                self.sample_rate
            )));
        }
        if !self.slice_period.is_finite() || self.period_samples() < 2 {
            return Err(Error::InvalidConfig(format!(
                "slice_period {} s is shorter than two samples",
                self.slice_period
            )));
        }
        if !(0.0..0.5).contains(&self.bandwidth_factor) {
            return Err(Error::InvalidConfig(format!(
                "bandwidth_factor {} must be in [0, 0.5)",
                self.bandwidth_factor
            )));
        }
        Ok(())
    }
}
