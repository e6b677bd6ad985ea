use std::sync::Arc;

use candlefix_core::RepairError;
use candlefix_core::repository::CandleRepository;
use candlefix_middleware::RepositoryBuilder;
use candlefix_types::RetryConfig;

use crate::{ScyllaConfig, ScyllaRepository};

/// Builder type alias specialized for Scylla repositories.
pub type ScyllaRepositoryBuilder = RepositoryBuilder;

impl ScyllaRepository {
    /// Connect and return a builder with the default middleware stack: a
    /// per-attempt deadline matching `cfg.request_timeout` wrapped by retries
    /// with [`RetryConfig::default`].
    ///
    /// Customize with the builder methods before calling `.build()`.
    ///
    /// # Errors
    /// Propagates connection failures from [`ScyllaRepository::connect`].
    pub async fn builder(cfg: &ScyllaConfig) -> Result<ScyllaRepositoryBuilder, RepairError> {
        let raw: Arc<dyn CandleRepository> = Arc::new(Self::connect(cfg).await?);
        Ok(RepositoryBuilder::new(raw)
            .with_timeout(cfg.request_timeout)
            .with_retry(RetryConfig::default()))
    }
}
