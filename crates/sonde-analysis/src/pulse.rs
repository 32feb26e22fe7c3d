//! Transient capture: find pulses in the sample stream and summarise them.
//!
//! While idle, every sample drives an envelope and an adaptive onset
//! threshold. When the envelope crosses the threshold a pulse begins, dated
//! back to the sample where the noise floor minimum was seen so the capture
//! includes the pulse's rise. Those earlier samples may belong to chunks that
//! were already processed, so the processor keeps just enough of the recent
//! input in a [`HoldQueue`] to reach back that far.
//!
//! A pulse ends when its envelope decays below a fraction of the envelope at
//! the latest positive peak, or when it reaches the maximum duration. The
//! finished pulse is reported as a [`PulseRecord`] with its timing, peaks,
//! energy spread and third-octave levels.

use std::sync::Arc;

use sonde_core::{EventLog, HoldQueue, PoolBuffer};
use sonde_dsp::{EnvelopeEstimator, OffsetThreshold, OnsetThreshold};

use crate::{FftPowerSpectrum, PulseConfig, Result, SpectralTransform, ThirdOctaveFilterbank};

/// Summary of one captured pulse. Offsets are in samples from `onset`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct PulseRecord {
    /// Absolute sample index of the first captured sample.
    pub onset: u64,
    pub duration: usize,
    pub peak_positive: f32,
    pub peak_positive_offset: usize,
    pub peak_negative: f32,
    pub peak_negative_offset: usize,
    /// First sample by which more than 5 % of the pulse energy has arrived.
    pub offset_5: usize,
    /// Last sample after which no more than 5 % of the energy remains.
    pub offset_95: usize,
    /// Third-octave levels of the zero-padded capture, plus the residual.
    pub levels: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InPulse,
}

#[derive(Debug, Default)]
struct Peaks {
    positive: f32,
    positive_offset: usize,
    negative: f32,
    negative_offset: usize,
}

pub struct PulseProcessor {
    config: PulseConfig,
    envelope: EnvelopeEstimator,
    onset: OnsetThreshold,
    offset: OffsetThreshold,
    held: HoldQueue,
    state: State,
    samples_seen: u64,
    pulse_onset: u64,
    capture: Vec<f32>,
    max_len: usize,
    peaks: Peaks,
    transform: FftPowerSpectrum,
    filterbank: ThirdOctaveFilterbank,
    spectrum: Vec<f32>,
    log: Option<Arc<EventLog>>,
}

impl PulseProcessor {
    pub fn new(config: PulseConfig) -> Result<Self> {
        config.validate()?;
        let max_len = config.max_duration_samples();
        let fft_len = max_len + max_len % 2;

        let transform = FftPowerSpectrum::new(fft_len)?;
        let filterbank = ThirdOctaveFilterbank::with_defaults(config.sample_rate, fft_len / 2)?;
        let onset = OnsetThreshold::new(config.onset_window, config.sample_rate, config.onset_ratio)?;

        tracing::debug!(
            max_len,
            fft_len,
            onset_window = onset.window_len(),
            bands = filterbank.num_levels(),
            "pulse processor ready"
        );

        Ok(Self {
            envelope: EnvelopeEstimator::new(config.envelope_time, config.sample_rate),
            offset: OffsetThreshold::new(config.decay_ratio),
            onset,
            held: HoldQueue::new(),
            state: State::Idle,
            samples_seen: 0,
            pulse_onset: 0,
            capture: Vec::with_capacity(fft_len),
            max_len,
            peaks: Peaks::default(),
            transform,
            filterbank,
            spectrum: vec![0.0; fft_len],
            config,
            log: None,
        })
    }

    pub fn with_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Process the first `frames` samples of `buffer`, appending every pulse
    /// that ends within them to `pulses`.
    pub fn write(
        &mut self,
        buffer: &PoolBuffer,
        frames: usize,
        pulses: &mut Vec<PulseRecord>,
    ) -> Result<()> {
        let data = &buffer.as_slice()[..frames];
        // A failed log write is reported once the whole chunk is processed.
        let mut deferred = None;

        for (i, &x) in data.iter().enumerate() {
            let env = self.envelope.next(x);
            match self.state {
                State::Idle => {
                    let threshold = self.onset.next(env);
                    if env > threshold {
                        self.start_pulse(data, i);
                        self.offset.reset(env);
                    }
                }
                State::InPulse => {
                    if self.capture_sample(x) {
                        self.offset.reset(env);
                    }
                    if self.capture.len() >= self.max_len || self.offset.next(env) {
                        if let Err(err) = self.end_pulse(pulses) {
                            deferred.get_or_insert(err);
                        }
                    }
                }
            }
        }
        self.samples_seen += frames as u64;

        match self.state {
            State::Idle => {
                // Keep everything back to the current floor minimum, which is
                // where the next pulse could start.
                let keep = if self.onset.is_primed() {
                    self.onset.age() + 1
                } else {
                    0
                };
                if keep > 0 {
                    self.held.add(buffer, frames)?;
                }
                self.held.retain_newest(keep);
            }
            State::InPulse => self.held.release_all(),
        }
        deferred.map_or(Ok(()), Err)
    }

    fn start_pulse(&mut self, data: &[f32], i: usize) {
        let age = self.onset.age();
        // The trigger sample must fit, so reach back at most `max_len - 1`.
        let reach = age.min(self.max_len - 1);
        let from_chunk = reach.min(i);
        let lead = (reach - from_chunk).min(self.held.total_frames());

        self.state = State::InPulse;
        self.pulse_onset = self.samples_seen + (i - from_chunk) as u64 - lead as u64;
        self.capture.clear();
        self.peaks = Peaks::default();

        // Samples before this chunk come from the held queue.
        if lead > 0 {
            self.capture.resize(lead, 0.0);
            self.held.read_tail_into(&mut self.capture);
            for offset in 0..lead {
                self.track_peak(self.capture[offset], offset);
            }
        }
        self.held.release_all();

        for &x in &data[i - from_chunk..=i] {
            self.capture_sample(x);
        }

        tracing::debug!(onset = self.pulse_onset, age, reach, "pulse started");
    }

    /// Store one sample of the pulse. Returns `true` on a new positive peak.
    fn capture_sample(&mut self, x: f32) -> bool {
        if self.capture.len() >= self.max_len {
            return false;
        }
        let offset = self.capture.len();
        self.capture.push(x);
        self.track_peak(x, offset)
    }

    fn track_peak(&mut self, x: f32, offset: usize) -> bool {
        if x > self.peaks.positive {
            self.peaks.positive = x;
            self.peaks.positive_offset = offset;
            true
        } else {
            if x < self.peaks.negative {
                self.peaks.negative = x;
                self.peaks.negative_offset = offset;
            }
            false
        }
    }

    /// Emit the captured pulse and return to idle. The processor is idle
    /// again even when this fails.
    fn end_pulse(&mut self, pulses: &mut Vec<PulseRecord>) -> Result<()> {
        let duration = self.capture.len();
        let (offset_5, offset_95) = energy_offsets(&self.capture);
        let levels = self.capture_levels();

        // Pulses never overlap.
        self.onset.reset();
        self.capture.clear();
        self.state = State::Idle;

        let record = PulseRecord {
            onset: self.pulse_onset,
            duration,
            peak_positive: self.peaks.positive,
            peak_positive_offset: self.peaks.positive_offset,
            peak_negative: self.peaks.negative,
            peak_negative_offset: self.peaks.negative_offset,
            offset_5,
            offset_95,
            levels: levels?,
        };

        if duration >= self.max_len {
            tracing::warn!(onset = record.onset, duration, "pulse cut at maximum duration");
        } else {
            tracing::debug!(onset = record.onset, duration, "pulse ended");
        }
        let message = format!(
            "pulse at sample {}: {} samples, peak {:e}",
            record.onset, duration, record.peak_positive
        );
        pulses.push(record);

        if let Some(log) = &self.log {
            log.message(&message)?;
        }
        Ok(())
    }

    /// Third-octave levels of the zero-padded capture.
    fn capture_levels(&mut self) -> Result<Vec<f32>> {
        let duration = self.capture.len();
        self.spectrum[..duration].copy_from_slice(&self.capture);
        self.spectrum[duration..].fill(0.0);
        self.transform.transform(&mut self.spectrum)?;

        let mut levels = vec![0.0; self.filterbank.num_levels() + 1];
        let bins = self.filterbank.analysis_length();
        self.filterbank.calculate(&self.spectrum[..bins], &mut levels);
        Ok(levels)
    }

    pub fn in_pulse(&self) -> bool {
        self.state == State::InPulse
    }

    /// Total samples written so far.
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Samples currently held for reaching back to a pulse start.
    pub fn held_frames(&self) -> usize {
        self.held.total_frames()
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Bands reported in [`PulseRecord::levels`], excluding the residual.
    pub fn num_bands(&self) -> usize {
        self.filterbank.num_levels()
    }

    /// Discard held input, any pulse in progress, and all detector history.
    /// Sample numbering continues.
    pub fn resync(&mut self) {
        self.held.release_all();
        self.envelope.reset();
        self.onset.reset();
        self.capture.clear();
        self.state = State::Idle;
    }

    /// Release held input and shut down. A pulse still in progress is
    /// dropped.
    pub fn finish(self) {
        if self.in_pulse() {
            tracing::debug!(onset = self.pulse_onset, "dropping unfinished pulse");
        }
        let mut held = self.held;
        held.release_all();
        held.exit();
    }
}

/// Offsets bounding the central 90 % of the energy in `samples`.
fn energy_offsets(samples: &[f32]) -> (usize, usize) {
    let Some(last) = samples.len().checked_sub(1) else {
        return (0, 0);
    };
    let total: f64 = samples.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    if total == 0.0 {
        return (0, last);
    }
    let tail = total / 20.0;

    let mut acc = 0.0;
    let offset_5 = samples
        .iter()
        .position(|&x| {
            acc += f64::from(x) * f64::from(x);
            acc > tail
        })
        .unwrap_or(last);

    acc = 0.0;
    let offset_95 = samples
        .iter()
        .rposition(|&x| {
            acc += f64::from(x) * f64::from(x);
            acc >= tail
        })
        .unwrap_or(0);

    (offset_5, offset_95)
}
