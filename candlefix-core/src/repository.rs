use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Candle, CandleKey, PartitionKey, RepairError};

/// Precondition attached to a row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Apply unconditionally (last writer wins).
    #[default]
    Always,
    /// Apply only if the stored `updatedAt` still equals this value.
    ///
    /// A mismatch must surface as [`RepairError::Conflict`].
    UpdatedAtEquals(Option<DateTime<Utc>>),
}

impl WriteCondition {
    /// Condition that guards a write of `row` against concurrent modification.
    #[must_use]
    pub const fn guarding(row: &Candle) -> Self {
        Self::UpdatedAtEquals(row.updated_at)
    }
}

/// Storage operations the repair engine needs from a candle store.
///
/// Every method addresses one keyspace; a keyspace holds the `candles` table
/// of one market domain. Implementations map driver failures onto
/// [`RepairError`] so callers can tell transient from permanent problems.
#[async_trait]
pub trait CandleRepository: Send + Sync {
    /// Short label used in logs and middleware snapshots.
    fn name(&self) -> &'static str;

    /// Whether `keyspace` exists.
    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError>;

    /// Distinct symbols that have at least one stored partition.
    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError>;

    /// Every row of one partition, in any order.
    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError>;

    /// Overwrite `open`, `high`, `low`, `close`, `volume` and `updatedAt` of the
    /// row identified by `candle.key()`.
    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError>;

    /// Remove the row identified by `key`.
    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError>;
}
