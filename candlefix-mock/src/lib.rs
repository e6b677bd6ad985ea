//! In-memory `CandleRepository` for tests.
//!
//! [`InMemoryRepository`] stores rows keyed like the real table and hands out a
//! [`MockController`] that seeds data, scripts faults per operation or
//! partition, and records every write that reached the store.

mod dynamic;
pub mod fixtures;

pub use dynamic::{InMemoryRepository, MockBehavior, MockController, Mutation, Operation};
