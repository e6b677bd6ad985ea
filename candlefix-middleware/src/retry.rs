use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use candlefix_core::{
    Candle, CandleKey, CandleRepository, Middleware, PartitionKey, RepairError, RetryConfig,
    WriteCondition,
};
use rand::Rng;

/// Add up to `jitter_percent`% of `base` as random jitter.
fn jitter_wait(base: Duration, jitter_percent: u8) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, base_ms.saturating_mul(u64::from(jitter_percent)) / 100)
    };
    let mut rng = rand::rng();
    Duration::from_millis(base_ms.saturating_add(rng.random_range(0..jitter_range)))
}

/// Repository wrapper that retries transient failures with exponential backoff.
///
/// Only errors where [`RepairError::is_transient`] holds are retried.
/// Unconditional updates and deletes are idempotent, so replaying one whose
/// acknowledgement was lost is harmless. A guarded write is not: its replay
/// finds the `updatedAt` it wrote itself and fails with `Conflict`, which is
/// not retried and fails the partition until the next run.
pub struct RetryingRepository {
    inner: Arc<dyn CandleRepository>,
    config: RetryConfig,
}

impl RetryingRepository {
    pub fn new(inner: Arc<dyn CandleRepository>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, RepairError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepairError>>,
    {
        #[cfg(not(feature = "tracing"))]
        let _ = operation;
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let wait = jitter_wait(self.config.base_delay(attempt), self.config.jitter_percent);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        repository = self.inner.name(),
                        operation,
                        attempt = attempt + 1,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "transient store error; retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_transient() && attempt > 0 => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        repository = self.inner.name(),
                        operation,
                        attempts = attempt + 1,
                        error = %e,
                        "giving up after retries"
                    );
                    return Err(RepairError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl CandleRepository for RetryingRepository {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError> {
        self.call("keyspace_exists", || self.inner.keyspace_exists(keyspace))
            .await
    }

    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError> {
        self.call("list_symbols", || self.inner.list_symbols(keyspace))
            .await
    }

    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError> {
        self.call("fetch_candles", || {
            self.inner.fetch_candles(keyspace, partition)
        })
        .await
    }

    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.call("update_candle", || {
            self.inner.update_candle(keyspace, candle, condition)
        })
        .await
    }

    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.call("delete_candle", || {
            self.inner.delete_candle(keyspace, key, condition)
        })
        .await
    }
}

pub struct RetryMiddleware {
    pub config: RetryConfig,
}

impl RetryMiddleware {
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl Middleware for RetryMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleRepository>) -> Arc<dyn CandleRepository> {
        Arc::new(RetryingRepository::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "RetryingRepository"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "max_retries": self.config.max_retries,
            "min_backoff_ms": self.config.min_backoff_ms,
            "max_backoff_ms": self.config.max_backoff_ms,
            "factor": self.config.factor,
            "jitter_percent": self.config.jitter_percent,
        })
    }
}
