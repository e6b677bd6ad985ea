//! Per-partition write plans.
//!
//! A plan is computed purely from the rows of one partition; applying it is
//! the only step that touches the store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use candlefix_core::{
    Candle, CandleKey, CandleRepository, Interval, PartitionOutcome, RepairError, WriteCondition,
    dedupe_series, repair_continuity, widen_to_fit,
};

/// Row overwrite with the precondition it is applied under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// Final values of the row.
    pub candle: Candle,
    /// Precondition derived from the row as it was read.
    pub condition: WriteCondition,
}

/// Row removal with the precondition it is applied under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDelete {
    /// Key of the surplus row.
    pub key: CandleKey,
    /// Precondition derived from the row as it was read.
    pub condition: WriteCondition,
}

/// A failed write, with how many writes of the plan already reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    /// Writes applied before `error`.
    pub applied: u64,
    /// The store error that stopped the plan.
    pub error: RepairError,
}

impl From<RepairError> for ApplyError {
    fn from(error: RepairError) -> Self {
        Self { applied: 0, error }
    }
}

/// Every write needed to bring one partition into a consistent state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionPlan {
    /// Rows read.
    pub scanned: u64,
    /// Opens corrected by the continuity pass.
    pub open_fixed: u64,
    /// Rewritten rows whose high/low widened over a stored close.
    pub extremes_widened: u64,
    /// One overwrite per changed row, ascending by bucket.
    pub updates: Vec<PlannedUpdate>,
    /// Surplus rows to delete after all updates.
    pub deletes: Vec<PlannedDelete>,
}

impl PartitionPlan {
    /// Plan the repair of one partition.
    ///
    /// Duplicates are merged first, then opens are chained to the previous
    /// close. A row touched by both passes is written once with its final
    /// values and `updated_at = now`. With `guard_writes` every write is
    /// conditioned on the `updated_at` that was read.
    ///
    /// Every rewritten row leaves well-formed: if a stored close already lies
    /// outside `[low, high]`, the bounds widen over it. Rows that need no other
    /// change are left as stored.
    #[must_use]
    pub fn build(
        rows: Vec<Candle>,
        interval: Interval,
        now: DateTime<Utc>,
        guard_writes: bool,
    ) -> Self {
        let condition = |c: &Candle| {
            if guard_writes {
                WriteCondition::guarding(c)
            } else {
                WriteCondition::Always
            }
        };

        let scanned = rows.len() as u64;
        let mut dedup = dedupe_series(rows, interval);
        let read_conditions: Vec<WriteCondition> = dedup.series.iter().map(condition).collect();
        let fixed = repair_continuity(&mut dedup.series);

        let changed: BTreeSet<usize> = dedup.merged.iter().chain(&fixed).copied().collect();
        let mut updates = Vec::with_capacity(changed.len());
        let mut extremes_widened = 0;
        for i in changed {
            let mut candle = dedup.series[i].clone();
            candle.updated_at = Some(now);
            if widen_to_fit(&mut candle) {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %candle.key(), close = %candle.close, "widening extremes over close");
                extremes_widened += 1;
            }
            updates.push(PlannedUpdate {
                candle,
                condition: read_conditions[i],
            });
        }

        let deletes = dedup
            .discarded
            .iter()
            .map(|c| PlannedDelete {
                key: c.key(),
                condition: condition(c),
            })
            .collect();

        Self {
            scanned,
            open_fixed: fixed.len() as u64,
            extremes_widened,
            updates,
            deletes,
        }
    }

    /// True when the partition is already consistent.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Outcome reported for this plan, whether or not it was applied.
    #[must_use]
    pub fn outcome(&self) -> PartitionOutcome {
        PartitionOutcome::Processed {
            scanned: self.scanned,
            duplicates_removed: self.deletes.len() as u64,
            open_fixed: self.open_fixed,
            extremes_widened: self.extremes_widened,
        }
    }

    /// Write the plan: every update first, then every delete.
    ///
    /// Stops at the first failed write. Writes already applied stay applied;
    /// re-running the partition finishes the job.
    ///
    /// Returns the number of writes issued.
    ///
    /// # Errors
    /// Returns the first store error together with the count of writes that
    /// preceded it.
    pub async fn apply(
        &self,
        repo: &dyn CandleRepository,
        keyspace: &str,
    ) -> Result<u64, ApplyError> {
        let mut applied = 0;
        for u in &self.updates {
            repo.update_candle(keyspace, &u.candle, u.condition)
                .await
                .map_err(|error| ApplyError { applied, error })?;
            applied += 1;
        }
        for d in &self.deletes {
            repo.delete_candle(keyspace, &d.key, d.condition)
                .await
                .map_err(|error| ApplyError { applied, error })?;
            applied += 1;
        }
        Ok(applied)
    }
}
