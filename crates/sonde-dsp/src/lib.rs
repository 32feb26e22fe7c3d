//! # Sonde DSP
//!
//! Per-sample level tracking used by the sonde detectors:
//!
//! - [`EnvelopeEstimator`]: instant attack, exponential release
//! - [`MinimaTracker`]: running minimum over the last `W` samples with the
//!   age of that minimum
//! - [`OnsetThreshold`]: `ratio x minimum` over a time window
//! - [`OffsetThreshold`]: end-of-pulse detection relative to a peak
//!
//! ```rust
//! use sonde_dsp::{EnvelopeEstimator, OnsetThreshold};
//!
//! let mut env = EnvelopeEstimator::new(0.05, 1000.0);
//! let mut onset = OnsetThreshold::new(0.1, 1000.0, 4.0).unwrap();
//!
//! let mut fired = false;
//! for i in 0..500 {
//!     let x = if i == 400 { 1.0 } else { 0.01 };
//!     let level = env.next(x);
//!     fired |= level > onset.next(level);
//! }
//! assert!(fired);
//! ```

pub mod envelope;
pub mod error;
pub mod minima;
pub mod offset;
pub mod onset;

pub use envelope::EnvelopeEstimator;
pub use error::{Error, Result};
pub use minima::MinimaTracker;
pub use offset::OffsetThreshold;
pub use onset::OnsetThreshold;
