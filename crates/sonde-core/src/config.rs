//! Buffer pool configuration.

use crate::{Error, Result};

/// Configuration for a [`BufferPool`](crate::BufferPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Capacities are rounded up to a multiple of this many frames.
    pub granularity: usize,
    /// Upper bound on buffers alive at once. `None` means unbounded.
    pub max_buffers: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            granularity: 64,
            max_buffers: None,
        }
    }
}

impl PoolConfig {
    /// Unbounded pool with the given allocation granularity.
    pub fn with_granularity(granularity: usize) -> Self {
        Self {
            granularity,
            ..Self::default()
        }
    }

    pub fn max_buffers(mut self, limit: usize) -> Self {
        self.max_buffers = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.granularity == 0 {
            return Err(Error::InvalidConfig(
                "granularity must be at least one frame".to_string(),
            ));
        }
        if self.max_buffers == Some(0) {
            return Err(Error::InvalidConfig(
                "max_buffers must allow at least one buffer".to_string(),
            ));
        }
        Ok(())
    }

    /// Capacity actually delivered for a request of `frames`.
    pub fn round_capacity(&self, frames: usize) -> usize {
        let frames = frames.max(1);
        frames.div_ceil(self.granularity) * self.granularity
    }
}
