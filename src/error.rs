//! Centralized error type for the sonde umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sonde_core::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] sonde_dsp::Error),

    #[cfg(feature = "analysis")]
    #[error("Analysis: {0}")]
    Analysis(#[from] sonde_analysis::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
