//! Middleware trait for wrapping `CandleRepository` implementations.

use std::sync::Arc;

use crate::repository::CandleRepository;

/// Trait implemented by repository middleware layers.
///
/// A middleware consumes an inner `CandleRepository` and returns a wrapped
/// repository that augments its behavior (e.g., timeouts, retries).
pub trait Middleware: Send + Sync {
    /// Apply this middleware to wrap an inner repository and return the wrapped repository.
    fn apply(self: Box<Self>, inner: Arc<dyn CandleRepository>) -> Arc<dyn CandleRepository>;

    /// Human-readable middleware name for introspection/logging.
    fn name(&self) -> &'static str;

    /// Opaque configuration snapshot for serialization/inspection.
    fn config_json(&self) -> serde_json::Value;
}
