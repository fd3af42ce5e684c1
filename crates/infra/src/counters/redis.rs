//! Redis-backed counter store.
//!
//! Counters are plain string keys holding integers (`INCR`/`DECR`/`GET`). Batches are
//! sent as a `MULTI`/`EXEC` pipeline, and key enumeration uses `SCAN ... MATCH ... COUNT`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::instrument;

use super::{CounterBatch, CounterError, CounterOp, CounterStore, ScanPage, parse_counter};

#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl core::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, CounterError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client).await.map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    #[instrument(skip(self), err)]
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        raw.map(|v| parse_counter(key, &v)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, CounterError> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(ScanPage { keys, cursor })
    }

    #[instrument(skip(self, batch), fields(deltas = batch.len()), err)]
    async fn execute(&self, batch: &CounterBatch) -> Result<(), CounterError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for delta in batch.iter() {
            match delta.op {
                CounterOp::Increment => pipe.incr(&delta.key, 1).ignore(),
                CounterOp::Decrement => pipe.decr(&delta.key, 1).ignore(),
            };
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: redis::RedisError) -> CounterError {
    if err.is_timeout() {
        CounterError::Timeout
    } else {
        CounterError::Unavailable(err.to_string())
    }
}
