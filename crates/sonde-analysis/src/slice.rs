//! Fixed-period time slices with peak, energy-moment and band statistics.
//!
//! The stream is cut into frames of two slice periods, one period apart.
//! Time-domain statistics cover the unwindowed centre half of each frame, so
//! consecutive slices tile the stream without overlap. Band levels come from
//! the whole sine-windowed frame and overlap their neighbours by half.

use sonde_core::PoolBuffer;

use crate::{
    FftPowerSpectrum, FrameAssembler, Result, SliceConfig, SpectralTransform,
    ThirdOctaveFilterbank,
};

/// Statistics of one time slice.
///
/// `sum_1` to `sum_4` are the sums of `x^2`, `x^4`, `x^6` and `x^8` over the
/// slice, enough to combine slices into energy variance, skewness and
/// kurtosis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceRecord {
    /// Slices emitted before this one.
    pub index: u64,
    /// Stream sample of the slice's first sample.
    pub start: u64,
    pub peak_positive: f32,
    pub peak_positive_offset: usize,
    pub peak_negative: f32,
    pub peak_negative_offset: usize,
    pub sum_1: f32,
    pub sum_2: f32,
    pub sum_3: f32,
    pub sum_4: f32,
    /// Band levels followed by the residual.
    pub levels: Vec<f32>,
}

pub struct TimeSliceProcessor {
    config: SliceConfig,
    period: usize,
    framer: FrameAssembler,
    transform: FftPowerSpectrum,
    filterbank: ThirdOctaveFilterbank,
    frame: Vec<f32>,
    /// Stream sample where the next frame begins.
    frame_origin: u64,
    samples_seen: u64,
    slices: u64,
}

impl TimeSliceProcessor {
    pub fn new(config: SliceConfig) -> Result<Self> {
        config.validate()?;
        let period = config.period_samples();
        let frame_len = 2 * period;

        let framer = FrameAssembler::new(frame_len, period)?;
        let transform = FftPowerSpectrum::new(frame_len)?.with_sine_window();
        let filterbank = ThirdOctaveFilterbank::new(
            config.sample_rate,
            period,
            config.bandwidth_factor,
            config.shape_order,
        )?;

        tracing::debug!(
            period,
            frame_len,
            bands = filterbank.num_levels(),
            "time slice processor ready"
        );

        Ok(Self {
            config,
            period,
            framer,
            transform,
            filterbank,
            frame: vec![0.0; frame_len],
            frame_origin: 0,
            samples_seen: 0,
            slices: 0,
        })
    }

    /// Process the first `frames` samples of `buffer`, appending a record for
    /// every slice completed. Returns the number of slices completed.
    pub fn write(
        &mut self,
        buffer: &PoolBuffer,
        frames: usize,
        slices: &mut Vec<SliceRecord>,
    ) -> Result<usize> {
        self.framer.push(buffer, frames)?;
        self.samples_seen += frames as u64;

        let mut completed = 0;
        while self.framer.next_frame(&mut self.frame) {
            let mut record = self.slice_stats();
            self.transform.transform(&mut self.frame)?;
            self.filterbank
                .calculate(&self.frame[..self.period], &mut record.levels);

            tracing::trace!(index = record.index, start = record.start, "time slice");
            slices.push(record);
            self.frame_origin += self.period as u64;
            self.slices += 1;
            completed += 1;
        }
        Ok(completed)
    }

    /// Time-domain statistics of the current frame's centre half.
    fn slice_stats(&self) -> SliceRecord {
        let len = self.frame.len();
        let centre = &self.frame[len / 4..len * 3 / 4];

        let mut record = SliceRecord {
            index: self.slices,
            start: self.frame_origin + (len / 4) as u64,
            peak_positive: 0.0,
            peak_positive_offset: 0,
            peak_negative: 0.0,
            peak_negative_offset: 0,
            sum_1: 0.0,
            sum_2: 0.0,
            sum_3: 0.0,
            sum_4: 0.0,
            levels: vec![0.0; self.filterbank.num_levels() + 1],
        };

        let mut sums = [0.0f64; 4];
        for (offset, &x) in centre.iter().enumerate() {
            let e = x as f64 * x as f64;
            let e2 = e * e;
            sums[0] += e;
            sums[1] += e2;
            sums[2] += e2 * e;
            sums[3] += e2 * e2;

            if x > record.peak_positive {
                record.peak_positive = x;
                record.peak_positive_offset = offset;
            } else if x < record.peak_negative {
                record.peak_negative = x;
                record.peak_negative_offset = offset;
            }
        }
        record.sum_1 = sums[0] as f32;
        record.sum_2 = sums[1] as f32;
        record.sum_3 = sums[2] as f32;
        record.sum_4 = sums[3] as f32;
        record
    }

    /// Drop held input after a break in the stream. Slicing restarts at the
    /// next sample written; slice indices keep counting.
    pub fn resync(&mut self) {
        tracing::debug!(
            dropped = self.framer.buffered(),
            at = self.samples_seen,
            "time slice resync"
        );
        self.framer.reset();
        self.frame_origin = self.samples_seen;
    }

    /// Slice period in samples.
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn num_bands(&self) -> usize {
        self.filterbank.num_levels()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn slices_emitted(&self) -> u64 {
        self.slices
    }

    /// Samples held towards the next frame.
    pub fn held_frames(&self) -> usize {
        self.framer.buffered()
    }

    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    /// Release all held input.
    pub fn finish(self) {
        self.framer.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sonde_core::{BufferPool, PoolConfig};

    fn config() -> SliceConfig {
        SliceConfig {
            sample_rate: 1000.0,
            slice_period: 0.1,
            ..SliceConfig::default()
        }
    }

    fn run(processor: &mut TimeSliceProcessor, pool: &BufferPool, signal: &[f32], chunk: usize) -> Vec<SliceRecord> {
        let mut slices = Vec::new();
        for part in signal.chunks(chunk) {
            let mut buffer = pool.acquire(part.len()).unwrap();
            buffer.get_mut().unwrap()[..part.len()].copy_from_slice(part);
            processor.write(&buffer, part.len(), &mut slices).unwrap();
        }
        slices
    }

    #[test]
    fn test_constant_signal_sums() {
        let pool = BufferPool::new(PoolConfig::default()).unwrap();
        let mut processor = TimeSliceProcessor::new(config()).unwrap();
        assert_eq!(processor.period(), 100);

        let slices = run(&mut processor, &pool, &[0.5; 400], 400);
        assert_eq!(slices.len(), 3);
        for (k, slice) in slices.iter().enumerate() {
            assert_eq!(slice.index, k as u64);
            assert_eq!(slice.start, 50 + 100 * k as u64);
            assert_eq!(slice.sum_1, 25.0);
            assert_eq!(slice.sum_2, 6.25);
            assert_eq!(slice.sum_3, 1.5625);
            assert_eq!(slice.sum_4, 0.390625);
            assert_eq!(slice.peak_positive, 0.5);
            assert_eq!(slice.peak_positive_offset, 0);
            assert_eq!(slice.peak_negative, 0.0);
            assert_eq!(slice.levels.len(), processor.num_bands() + 1);
        }
        assert_eq!(processor.held_frames(), 100);
        processor.finish();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_peaks_land_in_their_slice() {
        let pool = BufferPool::new(PoolConfig::default()).unwrap();
        let mut processor = TimeSliceProcessor::new(config()).unwrap();
        let mut signal = vec![0.0; 600];
        signal[260] = -1.5;
        signal[275] = 2.0;

        let slices = run(&mut processor, &pool, &signal, 128);
        assert_eq!(slices.len(), 5);

        let hit = &slices[2];
        assert_eq!(hit.start, 250);
        assert_eq!(hit.peak_positive, 2.0);
        assert_eq!(hit.peak_positive_offset, 25);
        assert_eq!(hit.peak_negative, -1.5);
        assert_eq!(hit.peak_negative_offset, 10);
        assert_relative_eq!(hit.sum_1, 4.0 + 2.25);

        for (k, slice) in slices.iter().enumerate().filter(|&(k, _)| k != 2) {
            assert_eq!(slice.peak_positive, 0.0, "slice {k}");
            assert_eq!(slice.peak_negative, 0.0, "slice {k}");
            assert_eq!(slice.sum_1, 0.0, "slice {k}");
        }
    }

    #[test]
    fn test_chunking_does_not_change_result() {
        let pool = BufferPool::new(PoolConfig::with_granularity(16)).unwrap();
        let signal: Vec<f32> = (0..1000)
            .map(|n| ((n * 7919) % 263) as f32 / 131.0 - 1.0)
            .collect();

        let mut whole = TimeSliceProcessor::new(config()).unwrap();
        let expected = run(&mut whole, &pool, &signal, signal.len());
        assert_eq!(expected.len(), 9);

        for chunk in [1, 37, 100, 333] {
            let mut processor = TimeSliceProcessor::new(config()).unwrap();
            assert_eq!(run(&mut processor, &pool, &signal, chunk), expected, "chunk {chunk}");
        }
    }

    #[test]
    fn test_tone_levels() {
        let pool = BufferPool::new(PoolConfig::default()).unwrap();
        let mut processor = TimeSliceProcessor::new(config()).unwrap();
        // 100 Hz sits on a bin of the 200-sample frame.
        let signal: Vec<f32> = (0..400)
            .map(|n| (2.0 * std::f64::consts::PI * (n as f64 / 10.0).fract()).sin() as f32)
            .collect();

        let slices = run(&mut processor, &pool, &signal, 150);
        assert_eq!(slices.len(), 3);
        for slice in &slices {
            assert_relative_eq!(slice.sum_1, 50.0, max_relative = 1e-4);
            let total: f32 = slice.levels.iter().sum();
            assert_relative_eq!(total, 0.5, max_relative = 1e-3);

            let loudest = slice
                .levels
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(band, _)| band);
            assert_eq!(loudest, Some(10));
            assert_eq!(ThirdOctaveFilterbank::band_centre(10), 100.0);
        }
    }

    #[test]
    fn test_resync_restarts_slicing() {
        let pool = BufferPool::new(PoolConfig::default()).unwrap();
        let mut processor = TimeSliceProcessor::new(config()).unwrap();

        let slices = run(&mut processor, &pool, &[0.1; 250], 250);
        assert_eq!(slices.len(), 1);
        assert_eq!(processor.held_frames(), 150);

        processor.resync();
        assert_eq!(processor.held_frames(), 0);
        assert_eq!(pool.outstanding(), 0);

        let slices = run(&mut processor, &pool, &[0.1; 200], 200);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].index, 1);
        assert_eq!(slices[0].start, 300);
        assert_eq!(processor.samples_seen(), 450);
        assert_eq!(processor.slices_emitted(), 2);
    }

    #[test]
    fn test_rejects_short_period() {
        let config = SliceConfig {
            slice_period: 0.001,
            ..config()
        };
        assert!(TimeSliceProcessor::new(config).is_err());
    }
}
