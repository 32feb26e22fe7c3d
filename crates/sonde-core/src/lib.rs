//! # Sonde Core
//!
//! Streaming plumbing for the sonde monitoring pipeline:
//!
//! - [`BufferPool`] / [`PoolBuffer`]: reference-counted sample buffers with
//!   pooled storage
//! - [`HoldQueue`]: ordered held windows over those buffers, with independent
//!   read cursors and partial consumption, no copying
//! - [`EventLog`]: leveled log handle with a started/finished lifecycle
//!
//! ```rust
//! use sonde_core::{BufferPool, HoldQueue, PoolConfig};
//!
//! let pool = BufferPool::new(PoolConfig::default()).unwrap();
//! let chunk = pool.acquire(100).unwrap();
//!
//! let mut queue = HoldQueue::new();
//! let held = queue.add(&chunk, 100).unwrap();
//! assert_eq!(chunk.ref_count(), 2);
//!
//! assert_eq!(queue.advance(held, 60), 40);
//! assert_eq!(queue.advance(held, 40), 0);
//! assert!(queue.is_empty());
//! assert_eq!(chunk.ref_count(), 1);
//! queue.exit();
//! ```

pub mod config;
pub mod error;
pub mod hold;
pub mod log;
pub mod pool;

pub use config::PoolConfig;
pub use error::{Error, Result};
pub use hold::{Cursor, HeldId, HoldQueue};
pub use log::{EventLog, LogLevel};
pub use pool::{BufferPool, PoolBuffer};
