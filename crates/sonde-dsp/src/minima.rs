//! Sliding-window minimum in amortized O(1) per sample.
//!
//! Candidates are kept in a deque ordered by insertion with non-decreasing
//! values. A new sample evicts every candidate from the back that is not
//! smaller than it, then candidates older than the window fall off the front.
//! The front is always the minimum of the last `W` samples, and an equal
//! newer sample always replaces an older one.

use std::collections::VecDeque;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f32,
    index: u64,
}

#[derive(Debug, Clone)]
pub struct MinimaTracker {
    window: usize,
    candidates: VecDeque<Candidate>,
    // Index the next sample will receive.
    ticker: u64,
}

impl MinimaTracker {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::InvalidWindow(
                "minima window must hold at least one sample".to_string(),
            ));
        }
        Ok(Self {
            window,
            candidates: VecDeque::with_capacity(window + 1),
            ticker: 0,
        })
    }

    /// Push one sample and return the minimum of the last `W` samples.
    #[inline]
    pub fn next(&mut self, x: f32) -> f32 {
        while self.candidates.back().is_some_and(|c| c.value >= x) {
            self.candidates.pop_back();
        }
        let newest = self.ticker;
        self.candidates.push_back(Candidate {
            value: x,
            index: newest,
        });
        while self
            .candidates
            .front()
            .is_some_and(|c| newest - c.index >= self.window as u64)
        {
            self.candidates.pop_front();
        }
        self.ticker += 1;

        // x itself is always in the window.
        self.candidates.front().map_or(x, |c| c.value)
    }

    /// Current minimum, `None` before the first sample.
    pub fn current(&self) -> Option<f32> {
        self.candidates.front().map(|c| c.value)
    }

    /// Samples between the current minimum and the newest sample. Never
    /// exceeds `W - 1`.
    pub fn current_age(&self) -> Option<usize> {
        let front = self.candidates.front()?;
        Some((self.ticker - 1 - front.index) as usize)
    }

    pub fn window_len(&self) -> usize {
        self.window
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.ticker = 0;
    }
}
