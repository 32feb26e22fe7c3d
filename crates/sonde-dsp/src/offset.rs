//! Offset detection for a pulse in progress.

/// Fires once the level falls below a fraction of a reference level.
#[derive(Debug, Clone)]
pub struct OffsetThreshold {
    ratio: f32,
    threshold: f32,
}

impl OffsetThreshold {
    pub fn new(ratio: f32) -> Self {
        Self {
            ratio,
            threshold: 0.0,
        }
    }

    /// Re-arm against a new reference level, e.g. a fresh peak.
    pub fn reset(&mut self, level: f32) {
        self.threshold = level * self.ratio;
    }

    /// Returns `true` when `level` has dropped below the threshold.
    #[inline]
    pub fn next(&mut self, level: f32) -> bool {
        level < self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }
}
