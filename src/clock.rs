// src/clock.rs - Injectable millisecond time source
//
// Every time-dependent component takes `now` as an argument instead of
// reading a clock itself; the node owning the component reads its `Clock`
// once per tick and hands the value down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Milliseconds since an arbitrary, node-local epoch.
pub type Timestamp = u64;

/// Monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the clock's epoch
    fn now_ms(&self) -> Timestamp;
}

/// Elapsed milliseconds between `since` and `now`.
///
/// A `since` later than `now` (clock reset, rollback) yields 0 rather than a
/// huge value, so an anomaly can never force an early escalation.
///
/// ```rust
/// use sirene::clock::elapsed_ms;
///
/// assert_eq!(elapsed_ms(1_500, 1_000), 500);
/// assert_eq!(elapsed_ms(1_000, 1_500), 0);
/// ```
pub fn elapsed_ms(now: Timestamp, since: Timestamp) -> u64 {
    now.checked_sub(since).unwrap_or(0)
}

/// Like [`elapsed_ms`], but on a rollback also moves `since` back to `now`
/// so the interval restarts instead of stalling until the clock catches up.
pub fn elapsed_rebased(now: Timestamp, since: &mut Timestamp) -> u64 {
    if now < *since {
        *since = now;
    }
    elapsed_ms(now, *since)
}

/// Wall-clock backed [`Clock`] for production nodes.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Manually driven [`Clock`] for replay and tests.
///
/// Clones share the same time, so a test can keep one handle and move the
/// other into a node.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Jump to an absolute time (may go backwards to simulate a reset)
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move time forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
