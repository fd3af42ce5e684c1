use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{CounterBatch, CounterError, CounterOp, CounterStore, ScanPage, parse_counter};

#[derive(Debug, Default)]
struct Faults {
    failing_batches: u32,
    failing_scans: u32,
    failing_gets: u32,
    unavailable: bool,
    latency: Option<Duration>,
    vanishing: Vec<String>,
}

/// In-memory counter store.
///
/// Intended for tests/dev. Values are kept as raw strings so corrupt counters can
/// be planted with [`InMemoryCounterStore::set_raw`]. Scan cursors are positions in
/// the sorted key space, so keys inserted during a scan may be skipped or repeated.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    values: RwLock<BTreeMap<String, String>>,
    faults: Mutex<Faults>,
    batches_executed: AtomicUsize,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current integer value of `key`, if present and numeric.
    pub fn value(&self, key: &str) -> Option<i64> {
        let values = self.values.read().ok()?;
        values.get(key).and_then(|raw| raw.parse().ok())
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn set_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(key);
        }
    }

    /// Number of batches applied successfully.
    pub fn batches_executed(&self) -> usize {
        self.batches_executed.load(Ordering::SeqCst)
    }

    /// Fail the next `n` batches without applying them.
    pub fn fail_next_batches(&self, n: u32) {
        self.with_faults(|f| f.failing_batches = n);
    }

    /// Fail the next `n` scan round trips.
    pub fn fail_next_scans(&self, n: u32) {
        self.with_faults(|f| f.failing_scans = n);
    }

    /// Fail the next `n` single-key reads.
    pub fn fail_next_gets(&self, n: u32) {
        self.with_faults(|f| f.failing_gets = n);
    }

    /// Fail every operation until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_faults(|f| f.unavailable = unavailable);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.with_faults(|f| f.latency = latency);
    }

    /// Delete `key` right after the next scan round trip has listed it.
    pub fn vanish_after_next_scan(&self, key: impl Into<String>) {
        self.with_faults(|f| f.vanishing.push(key.into()));
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.lock() {
            f(&mut faults);
        }
    }

    async fn pause(&self) {
        let latency = self.faults.lock().ok().and_then(|f| f.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_vanishing(&self) -> Vec<String> {
        self.faults
            .lock()
            .map(|mut f| std::mem::take(&mut f.vanishing))
            .unwrap_or_default()
    }

    fn injected_failure(&self, pick: impl FnOnce(&mut Faults) -> &mut u32) -> Result<(), CounterError> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| CounterError::Unavailable("lock poisoned".to_string()))?;
        if faults.unavailable {
            return Err(CounterError::Unavailable("store marked unavailable".to_string()));
        }
        let remaining = pick(&mut faults);
        if *remaining > 0 {
            *remaining -= 1;
            return Err(CounterError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        self.pause().await;
        self.injected_failure(|f| &mut f.failing_gets)?;
        let values = self
            .values
            .read()
            .map_err(|_| CounterError::Unavailable("lock poisoned".to_string()))?;
        values.get(key).map(|raw| parse_counter(key, raw)).transpose()
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, CounterError> {
        self.pause().await;
        self.injected_failure(|f| &mut f.failing_scans)?;
        let page = {
            let values = self
                .values
                .read()
                .map_err(|_| CounterError::Unavailable("lock poisoned".to_string()))?;

            let start = cursor as usize;
            let step = count.max(1);
            let keys = values
                .keys()
                .skip(start)
                .take(step)
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect();
            let next = start + step;
            let cursor = if next >= values.len() { 0 } else { next as u64 };
            ScanPage { keys, cursor }
        };
        for key in self.take_vanishing() {
            self.remove(&key);
        }
        Ok(page)
    }

    async fn execute(&self, batch: &CounterBatch) -> Result<(), CounterError> {
        self.pause().await;
        self.injected_failure(|f| &mut f.failing_batches)?;
        let mut values = self
            .values
            .write()
            .map_err(|_| CounterError::Unavailable("lock poisoned".to_string()))?;

        // Compute every new value before writing any, so a bad key leaves the batch unapplied.
        let mut staged: BTreeMap<&str, i64> = BTreeMap::new();
        for delta in batch.iter() {
            let current = match staged.get(delta.key.as_str()) {
                Some(v) => *v,
                None => match values.get(&delta.key) {
                    Some(raw) => parse_counter(&delta.key, raw)?,
                    None => 0,
                },
            };
            let next = match delta.op {
                CounterOp::Increment => current + 1,
                CounterOp::Decrement => current - 1,
            };
            staged.insert(delta.key.as_str(), next);
        }
        for (key, value) in staged {
            values.insert(key.to_string(), value.to_string());
        }
        self.batches_executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Glob matching with `*` (any run) and `?` (any single char).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_prefix_patterns() {
        assert!(glob_match("a_category_products:*", "a_category_products:123"));
        assert!(!glob_match("a_category_products:*", "a_supplier_products:123"));
        assert!(glob_match("a_?roduct_total", "a_product_total"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("a_product_total", "a_product_total_2"));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = InMemoryCounterStore::new();
        store.set_raw("bad", "twelve");
        let mut batch = CounterBatch::new();
        batch.increment("good").increment("bad");

        let err = store.execute(&batch).await.unwrap_err();
        assert!(matches!(err, CounterError::NotAnInteger { .. }));
        assert_eq!(store.value("good"), None);
        assert_eq!(store.batches_executed(), 0);
    }

    #[tokio::test]
    async fn repeated_key_in_one_batch_accumulates() {
        let store = InMemoryCounterStore::new();
        let mut batch = CounterBatch::new();
        batch.increment("k").increment("k").decrement("j");
        store.execute(&batch).await.unwrap();
        assert_eq!(store.value("k"), Some(2));
        assert_eq!(store.value("j"), Some(-1));
    }

    #[tokio::test]
    async fn scan_visits_every_matching_key_once_when_quiescent() {
        let store = InMemoryCounterStore::new();
        for i in 0..25 {
            store.set_raw(format!("x:{i:02}"), "1");
            store.set_raw(format!("y:{i:02}"), "1");
        }

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = store.scan(cursor, "x:*", 7).await.unwrap();
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 25);
        assert!(seen.iter().all(|k| k.starts_with("x:")));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryCounterStore::new();
        store.fail_next_batches(1);
        assert!(store.increment("k").await.is_err());
        store.increment("k").await.unwrap();
        assert_eq!(store.value("k"), Some(1));

        store.set_unavailable(true);
        assert!(store.get("k").await.is_err());
        store.set_unavailable(false);
        assert_eq!(store.get("k").await.unwrap(), Some(1));
    }
}
