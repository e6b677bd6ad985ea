//! candlefix-middleware
//!
//! Middleware wrappers for `CandleRepository` implementations and the builder
//! that composes them.

mod builder;
mod retry;
mod timeout;

pub use crate::builder::RepositoryBuilder;
pub use crate::retry::{RetryMiddleware, RetryingRepository};
pub use crate::timeout::{TimeoutMiddleware, TimeoutRepository};
