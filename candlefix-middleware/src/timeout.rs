use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use candlefix_core::{
    Candle, CandleKey, CandleRepository, Middleware, PartitionKey, RepairError, WriteCondition,
};

/// Repository wrapper that bounds every store round-trip with a deadline.
///
/// An elapsed deadline becomes [`RepairError::Timeout`], which the retry layer
/// treats as transient.
pub struct TimeoutRepository {
    inner: Arc<dyn CandleRepository>,
    timeout: Duration,
}

impl TimeoutRepository {
    pub fn new(inner: Arc<dyn CandleRepository>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix_middleware::timeout::call",
            skip(self, fut),
            fields(
                repository = self.inner.name(),
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        )
    )]
    async fn call<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, RepairError>
    where
        Fut: Future<Output = Result<T, RepairError>>,
    {
        (tokio::time::timeout(self.timeout, fut).await)
            .unwrap_or_else(|_| Err(RepairError::timeout(operation)))
    }
}

#[async_trait]
impl CandleRepository for TimeoutRepository {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError> {
        self.call("keyspace_exists", self.inner.keyspace_exists(keyspace))
            .await
    }

    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError> {
        self.call("list_symbols", self.inner.list_symbols(keyspace))
            .await
    }

    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError> {
        self.call("fetch_candles", self.inner.fetch_candles(keyspace, partition))
            .await
    }

    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.call(
            "update_candle",
            self.inner.update_candle(keyspace, candle, condition),
        )
        .await
    }

    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.call(
            "delete_candle",
            self.inner.delete_candle(keyspace, key, condition),
        )
        .await
    }
}

pub struct TimeoutMiddleware {
    pub timeout: Duration,
}

impl TimeoutMiddleware {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Middleware for TimeoutMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn CandleRepository>) -> Arc<dyn CandleRepository> {
        Arc::new(TimeoutRepository::new(inner, self.timeout))
    }

    fn name(&self) -> &'static str {
        "TimeoutRepository"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({ "timeout_ms": self.timeout.as_millis() })
    }
}
