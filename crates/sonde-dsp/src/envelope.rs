//! Peak envelope with instantaneous attack and exponential release.

#[derive(Debug, Clone)]
pub struct EnvelopeEstimator {
    decay: f32,
    level: f32,
}

impl EnvelopeEstimator {
    /// `time_constant` is the release time in seconds. A non-positive time
    /// constant disables the hold entirely (the output follows `|x|`).
    pub fn new(time_constant: f64, sample_rate: f64) -> Self {
        Self {
            decay: Self::time_to_decay(time_constant, sample_rate),
            level: 0.0,
        }
    }

    #[inline]
    fn time_to_decay(time: f64, sample_rate: f64) -> f32 {
        if time <= 0.0 || sample_rate <= 0.0 {
            0.0
        } else {
            (-1.0 / (time * sample_rate)).exp() as f32
        }
    }

    /// Feed one sample (amplitude or energy) and return the new level.
    #[inline]
    pub fn next(&mut self, x: f32) -> f32 {
        self.level = (self.decay * self.level).max(x.abs());
        self.level
    }

    pub fn current(&self) -> f32 {
        self.level
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}
