//! Adaptive onset threshold: a ratio over the recent noise floor.
//!
//! The floor is the minimum of the level track over the last `Tw` seconds.
//! Deciding whether a level is an onset (`level > threshold`) is left to the
//! caller.

use crate::{Error, MinimaTracker, Result};

#[derive(Debug, Clone)]
pub struct OnsetThreshold {
    minima: MinimaTracker,
    ratio: f32,
    threshold: f32,
}

impl OnsetThreshold {
    /// Window length is `round(time_constant * sample_rate)` samples.
    pub fn new(time_constant: f64, sample_rate: f64, ratio: f32) -> Result<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "onset ratio must be positive and finite, got {ratio}"
            )));
        }
        let window = (time_constant * sample_rate).round();
        if !window.is_finite() || window < 1.0 {
            return Err(Error::InvalidWindow(format!(
                "onset window of {time_constant} s at {sample_rate} Hz is {window} samples"
            )));
        }
        Ok(Self {
            minima: MinimaTracker::new(window as usize)?,
            ratio,
            threshold: 0.0,
        })
    }

    /// Feed one level value and return the updated threshold.
    #[inline]
    pub fn next(&mut self, x: f32) -> f32 {
        self.threshold = self.ratio * self.minima.next(x);
        self.threshold
    }

    /// Last threshold returned by [`next`](Self::next); zero before any input.
    pub fn current(&self) -> f32 {
        self.threshold
    }

    pub fn current_minimum(&self) -> Option<f32> {
        self.minima.current()
    }

    /// Age in samples of the floor minimum; zero before any input.
    pub fn age(&self) -> usize {
        self.minima.current_age().unwrap_or(0)
    }

    /// Whether any input has been seen since construction or reset.
    pub fn is_primed(&self) -> bool {
        self.minima.current().is_some()
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn window_len(&self) -> usize {
        self.minima.window_len()
    }

    pub fn reset(&mut self) {
        self.minima.reset();
        self.threshold = 0.0;
    }
}
