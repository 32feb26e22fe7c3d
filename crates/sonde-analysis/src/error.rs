//! Error types for sonde-analysis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No usable third-octave bands below Nyquist at {sample_rate} Hz")]
    NoUsableBands { sample_rate: f64 },

    #[error("Band index {index} out of range ({available} usable bands)")]
    BandOutOfRange { index: usize, available: usize },

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] sonde_core::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] sonde_dsp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
