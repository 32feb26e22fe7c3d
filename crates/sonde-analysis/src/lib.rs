//! # Sonde Analysis
//!
//! Spectral analysis stages of the sonde monitoring pipeline:
//!
//! - **Third-octave filterbank**: power spectrum to standard band levels,
//!   with smooth crossovers that sum to one at every bin
//! - **Spectral transform**: FFT power spectrum with an optional sine window
//! - **Frame assembler**: fixed frames with a fixed hop over pooled chunks of
//!   any size
//! - **Band monitor**: per-band envelope and adaptive onset detection
//! - **Pulse processor**: transient capture with timing, peaks and levels
//! - **Time slicer**: fixed-period peak, energy-moment and band statistics
//!
//! ## Example
//!
//! ```rust
//! use sonde_analysis::ThirdOctaveFilterbank;
//!
//! // 1 Hz bins up to 24 kHz.
//! let bank = ThirdOctaveFilterbank::with_defaults(48000.0, 24000).unwrap();
//! assert_eq!(bank.num_levels(), 34);
//!
//! let mut spectrum = vec![0.0; 24000];
//! spectrum[1000] = 1.0;
//! let mut levels = vec![0.0; bank.num_levels() + 1];
//! bank.calculate(&spectrum, &mut levels);
//! assert!((levels[20] - 1.0).abs() < 1e-6);
//! ```

pub mod config;
pub mod error;
pub mod filterbank;
pub mod framer;
pub mod monitor;
pub mod pulse;
pub mod slice;
pub mod spectrum;

pub use config::{MonitorConfig, PulseConfig, SliceConfig};
pub use error::{Error, Result};
pub use filterbank::{ThirdOctaveFilterbank, BAND_CENTRES, BAND_EDGES, MAX_BANDS};
pub use framer::FrameAssembler;
pub use monitor::{BandMonitor, BandOnset};
pub use pulse::{PulseProcessor, PulseRecord};
pub use slice::{SliceRecord, TimeSliceProcessor};
pub use spectrum::{sine_window, FftPowerSpectrum, SpectralTransform};
