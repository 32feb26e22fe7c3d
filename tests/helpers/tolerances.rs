//! Tolerance constants for analysis testing.

/// Floating point rounding errors.
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Spectral estimate tolerance (FFT rounding, window leakage).
pub const DSP_EPSILON: f32 = 1e-4;
