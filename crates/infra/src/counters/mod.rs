//! Counter cache: per-category and per-supplier product counts plus a grand total.
//!
//! The relational store is the source of truth for products; the counter cache is
//! a derived view kept in step with it by applying small INCR/DECR batches alongside
//! each product write. Statistics are computed from the cache alone.
//!
//! ## Consistency
//!
//! A batch is applied atomically (all of its increments/decrements, or none), but
//! batches are not ordered against the relational commit. Readers computing a
//! breakdown while writes are in flight may observe a total that does not yet match
//! the sum of the per-dimension counters.

pub mod in_memory;
pub mod keys;
pub mod manager;
#[cfg(feature = "redis")]
pub mod redis;
pub mod scan;

use async_trait::async_trait;

pub use in_memory::InMemoryCounterStore;
pub use keys::{CounterKeys, Dimension};
pub use manager::{AggregateCounterManager, PercentageBreakdown};
#[cfg(feature = "redis")]
pub use self::redis::RedisCounterStore;
pub use scan::KeyScan;

/// Counter store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter store operation timed out")]
    Timeout,

    #[error("counter {key} holds a non-integer value {value:?}")]
    NotAnInteger { key: String, value: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CounterOp {
    Increment,
    Decrement,
}

/// One pending change to a single counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub key: String,
    pub op: CounterOp,
}

/// An ordered set of counter changes applied as a single atomic pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterBatch {
    deltas: Vec<CounterDelta>,
}

impl CounterBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: impl Into<String>) -> &mut Self {
        self.deltas.push(CounterDelta {
            key: key.into(),
            op: CounterOp::Increment,
        });
        self
    }

    pub fn decrement(&mut self, key: impl Into<String>) -> &mut Self {
        self.deltas.push(CounterDelta {
            key: key.into(),
            op: CounterOp::Decrement,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CounterDelta> {
        self.deltas.iter()
    }
}

/// One round trip of a cursor-based key scan.
///
/// A returned `cursor` of `0` means the iteration is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub cursor: u64,
}

/// Key-value store holding integer counters.
///
/// Implementations must be `Send + Sync`: one store is shared by every request.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError>;

    /// One round trip of a cursor-based scan over keys matching `pattern`.
    ///
    /// Start with cursor `0`. The same key may be returned by more than one round trip.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, CounterError>;

    /// Apply every delta in `batch` atomically. Missing keys start at zero.
    async fn execute(&self, batch: &CounterBatch) -> Result<(), CounterError>;

    async fn increment(&self, key: &str) -> Result<(), CounterError> {
        let mut batch = CounterBatch::new();
        batch.increment(key);
        self.execute(&batch).await
    }

    async fn decrement(&self, key: &str) -> Result<(), CounterError> {
        let mut batch = CounterBatch::new();
        batch.decrement(key);
        self.execute(&batch).await
    }
}

/// Parse a stored counter value.
pub(crate) fn parse_counter(key: &str, raw: &str) -> Result<i64, CounterError> {
    raw.parse().map_err(|_| CounterError::NotAnInteger {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
