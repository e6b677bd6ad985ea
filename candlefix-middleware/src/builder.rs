//! Builder for composing a repository with middleware layers.
//!
//! # Middleware Ordering Convention
//!
//! Middleware layers form an "onion" around the raw repository:
//!
//! ```text
//! Orchestrator
//!     ↓
//! Outermost Middleware (e.g., Retry - replays transient failures)
//!     ↓
//! Inner Middleware (e.g., Timeout - bounds each attempt)
//!     ↓
//! Raw Repository (e.g., Scylla - issues the actual queries)
//! ```
//!
//! ## Storage vs Application Order
//!
//! The `layers` vector stores middleware in **outermost-first** order, but
//! they are **applied in reverse** during `build()` to construct the nesting.
//!
//! Example:
//! ```text
//! builder.with_timeout(..).with_retry(..)
//!
//! Storage: [Retry, Timeout]  (outermost first)
//! Applied:  Raw -> Timeout -> Retry  (innermost to outermost)
//! Result:   Retry(Timeout(Raw))
//! ```
//!
//! `with_timeout` always places the timeout directly around the raw
//! repository so each retry attempt gets its own deadline.
//!
//! This convention matches [`MiddlewareStack`](candlefix_types::MiddlewareStack)
//! where `layers[0]` is the outermost layer.

use std::sync::Arc;
use std::time::Duration;

use candlefix_core::Middleware;
use candlefix_core::repository::CandleRepository;
use candlefix_types::{MiddlewareLayer, MiddlewareStack, RetryConfig};
use serde_json::json;

use crate::retry::RetryMiddleware;
use crate::timeout::TimeoutMiddleware;

const RETRY: &str = "RetryingRepository";
const TIMEOUT: &str = "TimeoutRepository";

/// Generic middleware builder for composing a repository with layered wrappers.
///
/// See [module-level documentation](self) for details on middleware ordering.
pub struct RepositoryBuilder {
    raw: Arc<dyn CandleRepository>,
    /// Middleware layers in outermost-first order.
    layers: Vec<Box<dyn Middleware>>,
}

impl RepositoryBuilder {
    /// Create a new builder from a raw, unwrapped repository.
    #[must_use]
    pub fn new(raw: Arc<dyn CandleRepository>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    /// Add or replace the per-call deadline.
    ///
    /// The layer sits innermost, directly around the raw repository.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.layers.retain(|m| m.name() != TIMEOUT);
        self.layers.push(Box::new(TimeoutMiddleware::new(timeout)));
        self
    }

    /// Remove the timeout layer if present.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.layers.retain(|m| m.name() != TIMEOUT);
        self
    }

    /// Add or replace retry configuration.
    ///
    /// Adds retry middleware at the outermost position (index 0) so a
    /// transient failure from any inner layer can be replayed.
    #[must_use]
    pub fn with_retry(mut self, cfg: RetryConfig) -> Self {
        self.layers.retain(|m| m.name() != RETRY);
        self.layers.insert(0, Box::new(RetryMiddleware::new(cfg)));
        self
    }

    /// Remove retry if present.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.layers.retain(|m| m.name() != RETRY);
        self
    }

    /// Add an arbitrary middleware layer at the outermost position.
    #[must_use]
    pub fn layer(mut self, layer: Box<dyn Middleware>) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Export the current middleware stack configuration for inspection.
    ///
    /// The raw repository is appended as the innermost "layer" for observability.
    #[must_use]
    pub fn to_stack(&self) -> MiddlewareStack {
        let mut stack = MiddlewareStack::new();
        for layer in &self.layers {
            stack.push_inner(MiddlewareLayer::new(layer.name(), layer.config_json()));
        }
        stack.push_inner(MiddlewareLayer::new(
            "RawRepository",
            json!({ "name": self.raw.name() }),
        ));
        stack
    }

    /// Construct a builder from a raw repository and an explicit stack.
    ///
    /// Unknown middleware names are ignored. This is the inverse of
    /// [`to_stack`](Self::to_stack).
    #[must_use]
    pub fn from_stack(raw: Arc<dyn CandleRepository>, stack: &MiddlewareStack) -> Self {
        let defaults = RetryConfig::default();
        let mut layers: Vec<Box<dyn Middleware>> = Vec::new();
        for l in &stack.layers {
            let u64_field = |key: &str| l.config.get(key).and_then(serde_json::Value::as_u64);
            match l.name.as_str() {
                RETRY => {
                    let cfg = RetryConfig {
                        max_retries: u64_field("max_retries")
                            .and_then(|v| u32::try_from(v).ok())
                            .unwrap_or(defaults.max_retries),
                        min_backoff_ms: u64_field("min_backoff_ms").unwrap_or(defaults.min_backoff_ms),
                        max_backoff_ms: u64_field("max_backoff_ms").unwrap_or(defaults.max_backoff_ms),
                        factor: u64_field("factor")
                            .and_then(|v| u32::try_from(v).ok())
                            .unwrap_or(defaults.factor),
                        jitter_percent: u64_field("jitter_percent")
                            .and_then(|v| u8::try_from(v).ok())
                            .unwrap_or(defaults.jitter_percent),
                    };
                    layers.push(Box::new(RetryMiddleware::new(cfg)));
                }
                TIMEOUT => {
                    let ms = u64_field("timeout_ms").unwrap_or(10_000);
                    layers.push(Box::new(TimeoutMiddleware::new(Duration::from_millis(ms))));
                }
                _ => {}
            }
        }
        Self { raw, layers }
    }

    /// Build the wrapped repository according to the captured stack.
    ///
    /// Applies middleware layers in reverse order (innermost to outermost).
    #[must_use]
    pub fn build(self) -> Arc<dyn CandleRepository> {
        let mut acc: Arc<dyn CandleRepository> = Arc::clone(&self.raw);
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
