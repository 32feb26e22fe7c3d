//! Error types for sonde-core.

use thiserror::Error;

/// Error type for sonde-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Buffer pool exhausted: {outstanding} of {limit} buffers in use")]
    PoolExhausted { outstanding: usize, limit: usize },

    #[error("Allocation failed: {0}")]
    Allocation(#[from] std::collections::TryReserveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
