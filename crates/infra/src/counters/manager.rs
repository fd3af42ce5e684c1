//! Aggregate counter manager.
//!
//! Owns the counter naming scheme and the rules for turning product writes into
//! counter deltas, and computes percentage breakdowns from the counters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, instrument, warn};

use stockroom_catalog::ReferenceShift;
use stockroom_core::{CategoryId, SupplierId};

use super::keys::{CounterKeys, Dimension};
use super::scan::KeyScan;
use super::{CounterBatch, CounterError, CounterStore};

/// Default number of keys requested per scan round trip.
pub const DEFAULT_SCAN_BATCH: usize = 100;

/// Default bound on every single counter store operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifier → share of all products, in percent with two decimals.
pub type PercentageBreakdown = BTreeMap<String, Decimal>;

#[derive(Clone)]
pub struct AggregateCounterManager {
    store: Arc<dyn CounterStore>,
    keys: CounterKeys,
    scan_batch: usize,
    op_timeout: Duration,
}

impl core::fmt::Debug for AggregateCounterManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AggregateCounterManager")
            .field("keys", &self.keys)
            .field("scan_batch", &self.scan_batch)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl AggregateCounterManager {
    pub fn new(store: Arc<dyn CounterStore>, keys: CounterKeys) -> Self {
        Self {
            store,
            keys,
            scan_batch: DEFAULT_SCAN_BATCH,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_scan_batch(mut self, scan_batch: usize) -> Self {
        self.scan_batch = scan_batch.max(1);
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn keys(&self) -> &CounterKeys {
        &self.keys
    }

    /// Count one new product under its category, its supplier and the total.
    #[instrument(skip(self), fields(category_id = %category_id, supplier_id = %supplier_id), err)]
    pub async fn apply_create_delta(
        &self,
        category_id: CategoryId,
        supplier_id: SupplierId,
    ) -> Result<(), CounterError> {
        let mut batch = CounterBatch::new();
        batch
            .increment(self.keys.counter(Dimension::Supplier, &supplier_id))
            .increment(self.keys.total())
            .increment(self.keys.counter(Dimension::Category, &category_id));
        self.execute(&batch).await
    }

    /// Move one product between categories and/or suppliers.
    ///
    /// Unchanged dimensions are left alone and the total never moves. When nothing
    /// changed, the store is not contacted at all.
    #[instrument(
        skip(self, shift),
        fields(
            category_changed = shift.category_changed(),
            supplier_changed = shift.supplier_changed()
        ),
        err
    )]
    pub async fn apply_update_delta(&self, shift: &ReferenceShift) -> Result<(), CounterError> {
        let batch = self.update_batch(shift);
        if batch.is_empty() {
            debug!("references unchanged, no counter delta");
            return Ok(());
        }
        self.execute(&batch).await
    }

    fn update_batch(&self, shift: &ReferenceShift) -> CounterBatch {
        let mut batch = CounterBatch::new();
        if shift.supplier_changed() {
            batch
                .increment(self.keys.counter(Dimension::Supplier, &shift.supplier))
                .decrement(self.keys.counter(Dimension::Supplier, &shift.previous_supplier));
        }
        if shift.category_changed() {
            batch
                .increment(self.keys.counter(Dimension::Category, &shift.category))
                .decrement(self.keys.counter(Dimension::Category, &shift.previous_category));
        }
        batch
    }

    /// Current grand total. An absent total counter reads as zero.
    pub async fn total_products(&self) -> Result<i64, CounterError> {
        let total = self.bounded(self.store.get(&self.keys.total())).await?;
        Ok(total.unwrap_or(0))
    }

    /// Share of all products held by each category or supplier.
    ///
    /// Failing to read the total is an error. Everything after that is best-effort:
    /// malformed keys, unreadable or non-numeric counters and vanished keys are skipped,
    /// and a scan that keeps failing ends early with whatever was collected so far.
    #[instrument(skip(self), fields(dimension = %dimension), err)]
    pub async fn percentage_breakdown(
        &self,
        dimension: Dimension,
    ) -> Result<PercentageBreakdown, CounterError> {
        let mut breakdown = PercentageBreakdown::new();
        let total = self.total_products().await?;
        if total <= 0 {
            debug!(total, "no products counted");
            return Ok(breakdown);
        }

        let mut scan = self.scan(dimension);
        while let Some(key) = scan.next_key().await {
            let Some(id) = self.keys.parse_id(dimension, &key) else {
                warn!(key = %key, "skipping malformed counter key");
                continue;
            };
            if breakdown.contains_key(id) {
                continue;
            }
            match self.bounded(self.store.get(&key)).await {
                Ok(Some(count)) if count >= 0 => {
                    breakdown.insert(id.to_string(), percentage(count, total));
                }
                Ok(Some(count)) => {
                    warn!(key = %key, count, "skipping negative counter");
                }
                Ok(None) => {
                    debug!(key = %key, "counter vanished during scan");
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping unreadable counter");
                }
            }
        }

        if scan.is_truncated() {
            warn!(
                entries = breakdown.len(),
                "counter scan ended early, returning partial breakdown"
            );
        }
        Ok(breakdown)
    }

    /// Lazily enumerate every counter key of `dimension`.
    pub fn scan(&self, dimension: Dimension) -> KeyScan<'_> {
        KeyScan::new(
            self.store.as_ref(),
            self.keys.scan_pattern(dimension),
            self.scan_batch,
            self.op_timeout,
        )
    }

    async fn execute(&self, batch: &CounterBatch) -> Result<(), CounterError> {
        self.bounded(self.store.execute(batch)).await?;
        debug!(deltas = batch.len(), "counter delta applied");
        Ok(())
    }

    async fn bounded<T>(
        &self,
        op: impl core::future::Future<Output = Result<T, CounterError>>,
    ) -> Result<T, CounterError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .unwrap_or(Err(CounterError::Timeout))
    }
}

/// `count * 100 / total`, rounded half away from zero to two decimals.
pub fn percentage(count: i64, total: i64) -> Decimal {
    (Decimal::from(count) * Decimal::ONE_HUNDRED / Decimal::from(total))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
