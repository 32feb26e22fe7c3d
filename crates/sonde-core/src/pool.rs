//! Reference-counted sample buffers drawn from a reusable pool.
//!
//! A [`PoolBuffer`] is a shared handle: cloning it (or calling
//! [`PoolBuffer::add_ref`]) takes another reference, and dropping or
//! [`release`](PoolBuffer::release)-ing it gives one back. When the last
//! reference goes away the storage is returned to the pool's free list.
//! Because `release` consumes the handle, a reference can never be released
//! twice and a released buffer can never be read.
//!
//! ```rust
//! use sonde_core::{BufferPool, PoolConfig};
//!
//! let pool = BufferPool::new(PoolConfig::with_granularity(64)).unwrap();
//! let mut buffer = pool.acquire(100).unwrap();
//! assert!(buffer.capacity() >= 100);
//!
//! buffer.get_mut().unwrap()[0] = 1.0;
//! let shared = buffer.add_ref();
//! assert_eq!(buffer.ref_count(), 2);
//!
//! assert!(!shared.release());
//! assert!(buffer.release());
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{Error, PoolConfig, Result};

/// Allocator and recycler for [`PoolBuffer`]s.
///
/// Cheap to clone; clones share the same free list.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

struct PoolShared {
    config: PoolConfig,
    free: Mutex<Vec<Vec<f32>>>,
    outstanding: AtomicUsize,
}

impl PoolShared {
    fn recycle(&self, samples: Vec<f32>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        let mut free = self.free.lock();
        if free.try_reserve(1).is_ok() {
            free.push(samples);
        }
    }
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                config,
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Allocate `count` buffers of at least `frames` frames into the free list
    /// so later acquisitions do not allocate.
    pub fn preallocate(&self, count: usize, frames: usize) -> Result<()> {
        let capacity = self.shared.config.round_capacity(frames);
        let mut free = self.shared.free.lock();
        free.try_reserve(count)?;
        for _ in 0..count {
            free.push(allocate(capacity)?);
        }
        tracing::debug!(count, capacity, "preallocated pool buffers");
        Ok(())
    }

    /// Hand out a zeroed buffer with `capacity() >= min_frames` and a
    /// reference count of one.
    ///
    /// Fails with [`Error::PoolExhausted`] when the configured buffer limit
    /// is reached, or [`Error::Allocation`] when the storage cannot be
    /// allocated.
    pub fn acquire(&self, min_frames: usize) -> Result<PoolBuffer> {
        let shared = &self.shared;
        let capacity = shared.config.round_capacity(min_frames);

        if let Some(limit) = shared.config.max_buffers {
            let claimed = shared
                .outstanding
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < limit).then_some(n + 1)
                });
            if let Err(outstanding) = claimed {
                tracing::warn!(outstanding, limit, "buffer pool exhausted");
                return Err(Error::PoolExhausted { outstanding, limit });
            }
        } else {
            shared.outstanding.fetch_add(1, Ordering::AcqRel);
        }

        let reused = {
            let mut free = shared.free.lock();
            free.iter()
                .position(|samples| samples.len() >= capacity)
                .map(|index| free.swap_remove(index))
        };

        let samples = match reused {
            Some(mut samples) => {
                samples.fill(0.0);
                samples
            }
            None => match allocate(capacity) {
                Ok(samples) => {
                    tracing::debug!(capacity, "pool allocated new buffer");
                    samples
                }
                Err(err) => {
                    shared.outstanding.fetch_sub(1, Ordering::AcqRel);
                    return Err(err);
                }
            },
        };

        Ok(PoolBuffer {
            slot: Arc::new(Slot {
                samples,
                pool: Arc::downgrade(shared),
            }),
        })
    }

    /// Buffers currently handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Buffers waiting in the free list.
    pub fn free_count(&self) -> usize {
        self.shared.free.lock().len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.shared.config)
            .field("outstanding", &self.outstanding())
            .field("free", &self.free_count())
            .finish()
    }
}

fn allocate(capacity: usize) -> Result<Vec<f32>> {
    let mut samples = Vec::new();
    samples.try_reserve_exact(capacity)?;
    samples.resize(capacity, 0.0);
    Ok(samples)
}

struct Slot {
    samples: Vec<f32>,
    pool: Weak<PoolShared>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(std::mem::take(&mut self.samples));
        }
    }
}

/// Shared handle to a pooled sample buffer.
///
/// The reference count is the number of live handles. Storage returns to the
/// pool exactly when the count reaches zero.
#[derive(Clone)]
pub struct PoolBuffer {
    slot: Arc<Slot>,
}

impl PoolBuffer {
    /// Take an additional reference to the same storage.
    pub fn add_ref(&self) -> PoolBuffer {
        self.clone()
    }

    /// Give this reference back. Returns `true` when it was the last one and
    /// the storage went back to the pool.
    pub fn release(self) -> bool {
        Arc::into_inner(self.slot).is_some()
    }

    /// Current number of references. Diagnostic only.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }

    /// Capacity in frames, at least what was requested from the pool.
    pub fn capacity(&self) -> usize {
        self.slot.samples.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.slot.samples
    }

    /// Mutable access to the samples, available only while this is the sole
    /// reference (i.e. before the buffer has been shared).
    pub fn get_mut(&mut self) -> Option<&mut [f32]> {
        Arc::get_mut(&mut self.slot).map(|slot| slot.samples.as_mut_slice())
    }

    /// Whether both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &PoolBuffer) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Deref for PoolBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl AsRef<[f32]> for PoolBuffer {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}

impl fmt::Debug for PoolBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuffer")
            .field("capacity", &self.capacity())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
