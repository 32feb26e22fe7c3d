//! # Sonde - Real-time Acoustic Monitoring
//!
//! Streaming analysis core built from modular subsystems.
//!
//! ## Architecture
//!
//! Sonde is an umbrella crate that coordinates:
//! - **sonde-core** - Pooled sample buffers, hold queues, event log
//! - **sonde-dsp** - Envelope estimator, sliding minimum, onset/offset thresholds
//! - **sonde-analysis** - Third-octave filterbank, FFT power spectrum, band
//!   monitor, pulse processor, time slicer
//!
//! ## Quick Start
//!
//! ```rust
//! use sonde::prelude::*;
//!
//! # fn main() -> sonde::Result<()> {
//! let pool = BufferPool::new(PoolConfig::default())?;
//! let mut monitor = BandMonitor::new(MonitorConfig::new(48000.0))?;
//!
//! let mut events = Vec::new();
//! let chunk = pool.acquire(1024)?;
//! monitor.process(&chunk, 1024, &mut events)?;
//! monitor.finish();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Core plus analysis
//! - `analysis` - Filterbank, spectrum, band monitor, pulse processor, time
//!   slicer
//! - `serialization` - Serde derives on emitted records

/// Re-export of sonde-core for direct access
pub use sonde_core as core;

pub use sonde_core::{
    BufferPool, Cursor, EventLog, HeldId, HoldQueue, LogLevel, PoolBuffer, PoolConfig,
};

/// Re-export of sonde-dsp for direct access
pub use sonde_dsp as dsp;

pub use sonde_dsp::{EnvelopeEstimator, MinimaTracker, OffsetThreshold, OnsetThreshold};

#[cfg(feature = "analysis")]
pub use sonde_analysis as analysis;

#[cfg(feature = "analysis")]
pub use sonde_analysis::{
    BandMonitor, BandOnset, FftPowerSpectrum, FrameAssembler, MonitorConfig, PulseConfig,
    PulseProcessor, PulseRecord, SliceConfig, SliceRecord, SpectralTransform,
    ThirdOctaveFilterbank, TimeSliceProcessor,
};

pub mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        BufferPool, EnvelopeEstimator, Error, EventLog, HoldQueue, LogLevel, MinimaTracker,
        OnsetThreshold, PoolBuffer, PoolConfig, Result,
    };

    #[cfg(feature = "analysis")]
    pub use crate::{
        BandMonitor, BandOnset, MonitorConfig, PulseConfig, PulseProcessor, PulseRecord,
        SliceConfig, SliceRecord, SpectralTransform, ThirdOctaveFilterbank, TimeSliceProcessor,
    };
}
