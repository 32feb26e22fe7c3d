//! Per-band onset monitoring over a continuous stream.
//!
//! Pooled input chunks are cut into overlapping frames, each frame becomes a
//! power spectrum and then third-octave levels, and every band runs its own
//! envelope and adaptive threshold at the frame rate. An event is emitted
//! when a band's level first rises above its threshold; the band re-arms
//! once the level falls back.

use std::sync::Arc;

use sonde_core::{EventLog, PoolBuffer};
use sonde_dsp::{EnvelopeEstimator, OnsetThreshold};

use crate::{
    Error, FftPowerSpectrum, FrameAssembler, MonitorConfig, Result, SpectralTransform,
    ThirdOctaveFilterbank,
};

/// A band crossing its onset threshold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct BandOnset {
    pub band: usize,
    pub centre_hz: f64,
    /// Index of the analysis frame that fired, counted from the start of the
    /// stream.
    pub frame: u64,
    pub level: f32,
    pub threshold: f32,
    /// Frames since the band's floor minimum was observed.
    pub floor_age: usize,
}

struct BandTracker {
    envelope: EnvelopeEstimator,
    onset: OnsetThreshold,
    active: bool,
}

pub struct BandMonitor<T: SpectralTransform = FftPowerSpectrum> {
    config: MonitorConfig,
    framer: FrameAssembler,
    transform: T,
    filterbank: ThirdOctaveFilterbank,
    frame: Vec<f32>,
    levels: Vec<f32>,
    bands: Vec<BandTracker>,
    frames_analysed: u64,
    log: Option<Arc<EventLog>>,
}

impl BandMonitor<FftPowerSpectrum> {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let mut transform = FftPowerSpectrum::new(config.frame_len)?;
        if config.sine_window {
            transform = transform.with_sine_window();
        }
        Self::with_transform(config, transform)
    }
}

impl<T: SpectralTransform> BandMonitor<T> {
    /// Monitor driven by a caller-supplied spectral transform.
    pub fn with_transform(config: MonitorConfig, transform: T) -> Result<Self> {
        config.validate()?;
        if transform.block_len() != config.frame_len {
            return Err(Error::LengthMismatch {
                expected: config.frame_len,
                actual: transform.block_len(),
            });
        }

        let filterbank = ThirdOctaveFilterbank::new(
            config.sample_rate,
            config.frame_len / 2,
            config.bandwidth_factor,
            config.shape_order,
        )?;
        let frame_rate = config.frame_rate();
        let bands = (0..filterbank.num_levels())
            .map(|_| {
                Ok(BandTracker {
                    envelope: EnvelopeEstimator::new(config.envelope_time, frame_rate),
                    onset: OnsetThreshold::new(config.onset_window, frame_rate, config.onset_ratio)?,
                    active: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            bands = bands.len(),
            frame_len = config.frame_len,
            hop = config.hop,
            frame_rate,
            "band monitor ready"
        );

        Ok(Self {
            framer: FrameAssembler::new(config.frame_len, config.hop)?,
            frame: vec![0.0; config.frame_len],
            levels: vec![0.0; filterbank.num_levels() + 1],
            config,
            transform,
            filterbank,
            bands,
            frames_analysed: 0,
            log: None,
        })
    }

    /// Report every onset to `log` as well as returning it.
    pub fn with_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Feed the first `frames` samples of `buffer`. Every complete frame is
    /// analysed and any onsets are appended to `events`. Returns the number
    /// of frames analysed.
    pub fn process(
        &mut self,
        buffer: &PoolBuffer,
        frames: usize,
        events: &mut Vec<BandOnset>,
    ) -> Result<usize> {
        self.framer.push(buffer, frames)?;

        let mut analysed = 0;
        // A failed log write is reported after every frame has been tracked.
        let mut deferred = None;
        while self.framer.next_frame(&mut self.frame) {
            self.transform.transform(&mut self.frame)?;
            self.filterbank
                .calculate(&self.frame[..self.frame.len() / 2], &mut self.levels);
            if let Err(err) = self.track_levels(events) {
                deferred.get_or_insert(err);
            }
            self.frames_analysed += 1;
            analysed += 1;
        }
        match deferred {
            Some(err) => Err(err.into()),
            None => Ok(analysed),
        }
    }

    /// Update every band and push its onset, if any. Log failures do not
    /// interrupt the update; the first one is returned.
    fn track_levels(&mut self, events: &mut Vec<BandOnset>) -> sonde_core::Result<()> {
        let mut logged = Ok(());
        for (band, (tracker, &raw)) in self.bands.iter_mut().zip(&self.levels).enumerate() {
            let level = tracker.envelope.next(raw);
            let threshold = tracker.onset.next(level);
            let above = level > threshold;

            if above && !tracker.active {
                let onset = BandOnset {
                    band,
                    centre_hz: ThirdOctaveFilterbank::band_centre(band),
                    frame: self.frames_analysed,
                    level,
                    threshold,
                    floor_age: tracker.onset.age(),
                };
                tracing::debug!(
                    band,
                    centre_hz = onset.centre_hz,
                    frame = onset.frame,
                    level,
                    threshold,
                    "band onset"
                );
                match &self.log {
                    Some(log) if logged.is_ok() => {
                        logged = log.message(&format!(
                            "onset in {} Hz band at frame {}: level {:e} over threshold {:e}",
                            onset.centre_hz, onset.frame, level, threshold
                        ));
                    }
                    _ => {}
                }
                events.push(onset);
            }
            tracker.active = above;
        }
        logged
    }

    /// Band levels of the latest frame; the last entry is the residual
    /// above the highest band.
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn frames_analysed(&self) -> u64 {
        self.frames_analysed
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn filterbank(&self) -> &ThirdOctaveFilterbank {
        &self.filterbank
    }

    /// Drop held input and forget every band's history.
    pub fn reset(&mut self) {
        self.framer.reset();
        for tracker in &mut self.bands {
            tracker.envelope.reset();
            tracker.onset.reset();
            tracker.active = false;
        }
        self.levels.fill(0.0);
    }

    /// Release held input and shut down.
    pub fn finish(self) {
        tracing::debug!(frames = self.frames_analysed, "band monitor finished");
        self.framer.finish();
    }
}
