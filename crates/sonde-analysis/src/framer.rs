//! Fixed-length, fixed-hop analysis frames over variable-size input chunks.

use sonde_core::{HoldQueue, PoolBuffer};

use crate::{Error, Result};

pub struct FrameAssembler {
    queue: HoldQueue,
    frame_len: usize,
    hop: usize,
}

impl FrameAssembler {
    /// `hop` may be shorter than `frame_len` (overlapping frames) but not
    /// longer.
    pub fn new(frame_len: usize, hop: usize) -> Result<Self> {
        if frame_len == 0 || hop == 0 || hop > frame_len {
            return Err(Error::InvalidConfig(format!(
                "frame length {frame_len} and hop {hop} must satisfy 0 < hop <= frame length"
            )));
        }
        Ok(Self {
            queue: HoldQueue::new(),
            frame_len,
            hop,
        })
    }

    /// Hold the first `frames` frames of `buffer` until they have been
    /// framed.
    pub fn push(&mut self, buffer: &PoolBuffer, frames: usize) -> Result<()> {
        if frames > 0 {
            self.queue.add(buffer, frames)?;
        }
        Ok(())
    }

    /// Frames held and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.queue.total_frames()
    }

    /// Whether a full frame is available.
    pub fn ready(&self) -> bool {
        self.buffered() >= self.frame_len
    }

    /// Copy the next frame into `out` and step forward by the hop. Returns
    /// `false` (leaving `out` untouched) when less than a frame is held.
    ///
    /// # Panics
    ///
    /// If `out` is not `frame_len` long.
    pub fn next_frame(&mut self, out: &mut [f32]) -> bool {
        assert_eq!(out.len(), self.frame_len, "frame buffer length");
        if !self.ready() {
            return false;
        }
        self.queue.read_into(out);
        self.queue.consume(self.hop);
        true
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of chunks currently held.
    pub fn held_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Drop everything held.
    pub fn reset(&mut self) {
        self.queue.release_all();
    }

    /// Release everything and tear down the queue.
    pub fn finish(self) {
        let mut queue = self.queue;
        queue.release_all();
        queue.exit();
    }
}
