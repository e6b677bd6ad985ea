//! Report envelopes produced by the repair orchestrator.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candle::PartitionKey;
use crate::config::MarketDomain;
use crate::error::RepairError;

/// Reminder printed after every run: consumers holding candles in memory keep
/// serving pre-repair values until they reload.
pub const CACHE_INVALIDATION_NOTICE: &str = "restart or invalidate every long-lived candle cache/consumer process: it may still hold stale in-memory copies of repaired candles";

/// Counters folded from partition results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairStats {
    /// Partitions visited (including empty, failed and cancelled ones).
    pub partitions: u64,
    /// Candle rows read.
    pub scanned: u64,
    /// Surplus rows deleted (or that would be deleted in a dry run).
    pub duplicates_removed: u64,
    /// Candles whose open was corrected.
    pub open_fixed: u64,
    /// Rewritten candles whose high/low had to widen over a stored close.
    #[serde(default)]
    pub extremes_widened: u64,
    /// Partitions that held no candles.
    pub empty_partitions: u64,
    /// Partitions skipped because of an error.
    pub failed_partitions: u64,
    /// Partitions not started because the run was cancelled.
    pub cancelled_partitions: u64,
}

impl RepairStats {
    /// Number of row mutations these counters imply.
    #[must_use]
    pub const fn mutations(&self) -> u64 {
        self.duplicates_removed + self.open_fixed
    }
}

impl AddAssign for RepairStats {
    fn add_assign(&mut self, rhs: Self) {
        self.partitions += rhs.partitions;
        self.scanned += rhs.scanned;
        self.duplicates_removed += rhs.duplicates_removed;
        self.open_fixed += rhs.open_fixed;
        self.extremes_widened += rhs.extremes_widened;
        self.empty_partitions += rhs.empty_partitions;
        self.failed_partitions += rhs.failed_partitions;
        self.cancelled_partitions += rhs.cancelled_partitions;
    }
}

impl Add for RepairStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for RepairStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// What happened to a single `(symbol, interval)` partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartitionOutcome {
    /// The partition holds no candles; nothing to do.
    Empty,
    /// The partition was scanned and repaired (possibly with zero changes).
    Processed {
        /// Rows read.
        scanned: u64,
        /// Surplus rows removed.
        duplicates_removed: u64,
        /// Opens corrected.
        open_fixed: u64,
        /// Rewritten rows whose high/low widened over a stored close.
        #[serde(default)]
        extremes_widened: u64,
    },
    /// The partition stopped on an error.
    Failed {
        /// Why it failed.
        error: RepairError,
        /// Writes that reached the store before the error.
        #[serde(default)]
        writes_applied: u64,
    },
    /// The run was cancelled before this partition started.
    Cancelled,
}

impl PartitionOutcome {
    /// Counters contributed by this outcome.
    #[must_use]
    pub fn stats(&self) -> RepairStats {
        let mut s = RepairStats {
            partitions: 1,
            scanned: 0,
            duplicates_removed: 0,
            open_fixed: 0,
            extremes_widened: 0,
            empty_partitions: 0,
            failed_partitions: 0,
            cancelled_partitions: 0,
        };
        match self {
            Self::Empty => s.empty_partitions = 1,
            Self::Processed {
                scanned,
                duplicates_removed,
                open_fixed,
                extremes_widened,
            } => {
                s.scanned = *scanned;
                s.duplicates_removed = *duplicates_removed;
                s.open_fixed = *open_fixed;
                s.extremes_widened = *extremes_widened;
            }
            Self::Failed { .. } => s.failed_partitions = 1,
            Self::Cancelled => s.cancelled_partitions = 1,
        }
        s
    }
}

/// Result of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    /// Domain the partition belongs to.
    pub domain: MarketDomain,
    /// The partition itself.
    pub partition: PartitionKey,
    /// What happened.
    pub outcome: PartitionOutcome,
}

/// A partition that failed, kept with enough context to re-run it alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionFailure {
    /// The failed partition.
    pub partition: PartitionKey,
    /// Error that stopped it.
    pub error: RepairError,
    /// Writes already applied; a re-run only finishes the rest.
    #[serde(default)]
    pub writes_applied: u64,
}

/// Domain-level status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DomainStatus {
    /// Every planned partition was visited (individual partitions may still have failed).
    Completed,
    /// The keyspace does not exist; the domain was skipped without error.
    MissingKeyspace,
    /// The domain could not be planned (e.g. listing symbols failed).
    Failed {
        /// Why it failed.
        error: RepairError,
    },
}

/// Summary of one market domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    /// The domain.
    pub domain: MarketDomain,
    /// Keyspace it was read from.
    pub keyspace: String,
    /// Domain-level status.
    pub status: DomainStatus,
    /// Folded partition counters.
    pub stats: RepairStats,
    /// Every failed partition.
    pub failures: Vec<PartitionFailure>,
}

impl DomainReport {
    /// Report for a domain that never got to process partitions.
    pub fn skipped(domain: MarketDomain, keyspace: impl Into<String>, status: DomainStatus) -> Self {
        Self {
            domain,
            keyspace: keyspace.into(),
            status,
            stats: RepairStats::default(),
            failures: Vec::new(),
        }
    }

    /// Fold partition results into a completed domain report.
    pub fn from_partitions<I>(domain: MarketDomain, keyspace: impl Into<String>, reports: I) -> Self
    where
        I: IntoIterator<Item = PartitionReport>,
    {
        let mut stats = RepairStats::default();
        let mut failures = Vec::new();
        for r in reports {
            stats += r.outcome.stats();
            if let PartitionOutcome::Failed {
                error,
                writes_applied,
            } = r.outcome
            {
                failures.push(PartitionFailure {
                    partition: r.partition,
                    error,
                    writes_applied,
                });
            }
        }
        failures.sort_by(|a, b| a.partition.cmp(&b.partition));
        Self {
            domain,
            keyspace: keyspace.into(),
            status: DomainStatus::Completed,
            stats,
            failures,
        }
    }

    /// True when nothing about this domain needs operator attention.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self.status, DomainStatus::Failed { .. })
            && self.failures.is_empty()
            && self.stats.cancelled_partitions == 0
    }
}

/// Final report of a repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-domain summaries in processing order.
    pub domains: Vec<DomainReport>,
}

impl RepairReport {
    /// Counters summed across every domain.
    #[must_use]
    pub fn totals(&self) -> RepairStats {
        self.domains.iter().map(|d| d.stats).sum()
    }

    /// Summary for one domain, if it was part of the run.
    #[must_use]
    pub fn domain(&self, domain: MarketDomain) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.domain == domain)
    }

    /// True when no domain or partition failed and nothing was cancelled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.domains.iter().all(DomainReport::is_clean)
    }
}

fn write_stats(f: &mut fmt::Formatter<'_>, s: &RepairStats) -> fmt::Result {
    write!(
        f,
        "scanned={} duplicates_removed={} open_fixed={} extremes_widened={} partitions={} empty={} failed={} cancelled={}",
        s.scanned,
        s.duplicates_removed,
        s.open_fixed,
        s.extremes_widened,
        s.partitions,
        s.empty_partitions,
        s.failed_partitions,
        s.cancelled_partitions
    )
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "candle repair summary (dry run, nothing written)")?;
        } else {
            writeln!(f, "candle repair summary")?;
        }
        for d in &self.domains {
            write!(f, "  {} [{}]: ", d.domain, d.keyspace)?;
            match &d.status {
                DomainStatus::MissingKeyspace => write!(f, "keyspace missing, skipped; ")?,
                DomainStatus::Failed { error } => write!(f, "ERROR {error}; ")?,
                DomainStatus::Completed => {}
            }
            write_stats(f, &d.stats)?;
            writeln!(f)?;
            for fail in &d.failures {
                write!(f, "    failed {}", fail.partition)?;
                if fail.writes_applied > 0 {
                    write!(f, " after {} writes", fail.writes_applied)?;
                }
                writeln!(f, ": {}", fail.error)?;
            }
        }
        write!(f, "  total: ")?;
        write_stats(f, &self.totals())?;
        writeln!(f)?;
        write!(f, "NOTE: {CACHE_INVALIDATION_NOTICE}")
    }
}
