use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::warn;

use super::{CounterError, CounterStore};

/// Consecutive failed round trips after which a scan gives up.
pub const MAX_CONSECUTIVE_SCAN_FAILURES: u32 = 3;

const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Lazy, single-pass sequence of keys matching a pattern.
///
/// Each call to [`KeyScan::next_key`] consumes buffered keys and only issues another
/// scan round trip once the buffer is empty. The sequence ends when the store hands
/// back cursor `0`, or after [`MAX_CONSECUTIVE_SCAN_FAILURES`] failed round trips in a
/// row (the scan is then marked [truncated](KeyScan::is_truncated)). A finished scan
/// cannot be restarted. Keys the store reports more than once are yielded once.
pub struct KeyScan<'s> {
    store: &'s dyn CounterStore,
    pattern: String,
    batch: usize,
    round_trip_timeout: Duration,
    cursor: u64,
    buffered: VecDeque<String>,
    yielded: HashSet<String>,
    failures: u32,
    finished: bool,
    truncated: bool,
}

impl<'s> KeyScan<'s> {
    pub fn new(
        store: &'s dyn CounterStore,
        pattern: impl Into<String>,
        batch: usize,
        round_trip_timeout: Duration,
    ) -> Self {
        Self {
            store,
            pattern: pattern.into(),
            batch: batch.max(1),
            round_trip_timeout,
            cursor: 0,
            buffered: VecDeque::new(),
            yielded: HashSet::new(),
            failures: 0,
            finished: false,
            truncated: false,
        }
    }

    pub async fn next_key(&mut self) -> Option<String> {
        loop {
            while let Some(key) = self.buffered.pop_front() {
                if self.yielded.insert(key.clone()) {
                    return Some(key);
                }
            }
            if self.finished {
                return None;
            }
            self.round_trip().await;
        }
    }

    /// `true` once the scan stopped early because the store kept failing.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    async fn round_trip(&mut self) {
        let result = tokio::time::timeout(
            self.round_trip_timeout,
            self.store.scan(self.cursor, &self.pattern, self.batch),
        )
        .await
        .unwrap_or(Err(CounterError::Timeout));

        match result {
            Ok(page) => {
                self.failures = 0;
                self.buffered.extend(page.keys);
                self.cursor = page.cursor;
                if page.cursor == 0 {
                    self.finished = true;
                }
            }
            Err(err) => {
                self.failures += 1;
                warn!(
                    pattern = %self.pattern,
                    cursor = self.cursor,
                    attempt = self.failures,
                    error = %err,
                    "counter scan round trip failed"
                );
                if self.failures >= MAX_CONSECUTIVE_SCAN_FAILURES {
                    self.finished = true;
                    self.truncated = true;
                } else {
                    tokio::time::sleep(RETRY_BACKOFF * self.failures).await;
                }
            }
        }
    }
}
