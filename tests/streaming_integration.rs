//! Streaming integration tests
//!
//! Buffer pool, hold queue and event log working together the way an input
//! stage and its consumers use them.
//!
//! Run with:
//! ```bash
//! cargo test -p sonde --test streaming_integration
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::tolerances::*;
use helpers::{generate_integer_staircase, pooled, pooled_chunks, test_pool};
use sonde::prelude::*;

// =============================================================================
// Reference Counting Across Pool and Queue
// =============================================================================

/// A 100-frame chunk added to a queue and fully advanced leaves the queue
/// empty and the chunk's count where it started.
#[test]
fn test_full_advance_restores_ref_count() {
    let pool = test_pool();
    let chunk = pool.acquire(100).unwrap();
    assert!(chunk.capacity() >= 100);
    assert_eq!(chunk.ref_count(), 1);

    let mut queue = HoldQueue::new();
    let held = queue.add(&chunk, 100).unwrap();
    assert_eq!(chunk.ref_count(), 2);

    assert_eq!(queue.advance(held, 100), 0);
    assert!(queue.is_empty());
    assert!(queue.oldest().is_none());
    assert_eq!(chunk.ref_count(), 1);

    queue.exit();
    assert!(chunk.release());
    assert_eq!(pool.outstanding(), 0);
}

/// Two consumers hold the same chunks and consume at different rates.
#[test]
fn test_independent_consumers_share_chunks() {
    let pool = test_pool();
    let signal = generate_integer_staircase(300);
    let chunks = pooled_chunks(&pool, &signal, &[100]);

    let mut fast = HoldQueue::new();
    let mut slow = HoldQueue::new();
    for (chunk, frames) in &chunks {
        fast.add(chunk, *frames).unwrap();
        slow.add(chunk, *frames).unwrap();
    }
    drop(chunks);
    assert_eq!(pool.outstanding(), 3);

    assert_eq!(fast.consume(250), 250);
    assert_eq!(slow.consume(50), 50);

    // The first two chunks are still referenced by the slow consumer.
    assert_eq!(pool.outstanding(), 3);
    let mut out = [0.0; 4];
    fast.read_into(&mut out);
    assert_eq!(out, [250.0, 251.0, 252.0, 253.0]);
    slow.read_into(&mut out);
    assert_eq!(out, [50.0, 51.0, 52.0, 53.0]);

    slow.consume(200);
    assert_eq!(pool.outstanding(), 1);

    fast.release_all();
    slow.release_all();
    fast.exit();
    slow.exit();
    assert_eq!(pool.outstanding(), 0);
}

/// Fixed-size reads over variable-size chunks see every frame exactly once.
#[test]
fn test_fixed_reads_over_variable_chunks() {
    let pool = test_pool();
    let signal = generate_integer_staircase(1000);
    let mut queue = HoldQueue::new();
    let mut block = [0.0f32; 64];
    let mut next_expected = 0.0f32;

    for (chunk, frames) in pooled_chunks(&pool, &signal, &[37, 5, 120, 64, 1]) {
        queue.add(&chunk, frames).unwrap();
        while queue.total_frames() >= block.len() {
            assert_eq!(queue.read_into(&mut block), block.len());
            for &s in &block {
                assert!((s - next_expected).abs() < FLOAT_EPSILON);
                next_expected += 1.0;
            }
            queue.consume(block.len());
        }
    }

    assert_eq!(next_expected, 960.0);
    assert_eq!(queue.total_frames(), 40);
    queue.release_all();
    queue.exit();
}

/// Windows can be dropped from the middle while the rest keep their order.
#[test]
fn test_interior_release_keeps_order() {
    let pool = test_pool();
    let a = pooled(&pool, &[1.0]);
    let b = pooled(&pool, &[2.0]);
    let c = pooled(&pool, &[3.0]);

    let mut queue = HoldQueue::new();
    let ha = queue.add(&a, 1).unwrap();
    let hb = queue.add(&b, 1).unwrap();
    let hc = queue.add(&c, 1).unwrap();
    drop(b);

    assert!(queue.release(hb));
    assert_eq!(queue.next(ha), Some(hc));
    assert_eq!(queue.prev(hc), Some(ha));
    assert_eq!(queue.iter().map(|id| queue.data(id)[0]).collect::<Vec<_>>(), vec![1.0, 3.0]);

    queue.release_all();
    queue.exit();
}

// =============================================================================
// Failure Reporting
// =============================================================================

/// Pool exhaustion is a recoverable error that converts to the umbrella type.
#[test]
fn test_pool_exhaustion_reaches_caller() {
    fn acquire_two(pool: &BufferPool) -> Result<(PoolBuffer, PoolBuffer)> {
        Ok((pool.acquire(16)?, pool.acquire(16)?))
    }

    let pool = BufferPool::new(PoolConfig::with_granularity(16).max_buffers(1)).unwrap();
    let err = acquire_two(&pool).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(sonde::core::Error::PoolExhausted { limit: 1, .. })
    ));
    assert_eq!(pool.outstanding(), 0);
}

/// The log writes started, records and finished in order.
#[test]
fn test_event_log_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.log");

    let log = EventLog::open(&path, "monitor").unwrap();
    log.log(LogLevel::Message, "stream opened").unwrap();
    log.log(LogLevel::Warning, "chunk dropped").unwrap();
    log.finish().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("monitor started at "));
    assert_eq!(lines[1], "MESSAGE: stream opened");
    assert_eq!(lines[2], "WARNING: chunk dropped");
    assert!(lines[3].starts_with("monitor finished at "));
}
