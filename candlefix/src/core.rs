use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use candlefix_core::{
    CancelToken, Candle, CandleRepository, DomainConfig, DomainReport, DomainStatus, Interval,
    PartitionKey, PartitionOutcome, PartitionReport, RepairConfig, RepairError, RepairReport,
    ensure_single_partition,
};

use crate::plan::{ApplyError, PartitionPlan};

/// Orchestrator that repairs every configured partition of every domain.
pub struct Repairer {
    pub(crate) repo: Arc<dyn CandleRepository>,
    pub(crate) cfg: RepairConfig,
}

/// Builder for constructing a `Repairer` with custom configuration.
pub struct RepairerBuilder {
    repo: Option<Arc<dyn CandleRepository>>,
    cfg: RepairConfig,
}

impl Default for RepairerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairerBuilder {
    /// Create a new builder with the default configuration.
    ///
    /// Defaults: spot (`ecosystem`) and futures (`futures`) keyspaces, every
    /// interval, every symbol, one partition at a time, writes enabled and
    /// unguarded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            repo: None,
            cfg: RepairConfig::default(),
        }
    }

    /// Register the store to repair. Usually the output of a
    /// `RepositoryBuilder`, so retries and deadlines already apply.
    #[must_use]
    pub fn with_repository(mut self, repo: Arc<dyn CandleRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: RepairConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Domains to process, in order.
    #[must_use]
    pub fn domains(mut self, domains: Vec<DomainConfig>) -> Self {
        self.cfg.domains = domains;
        self
    }

    /// Restrict the run to a subset of intervals.
    #[must_use]
    pub fn intervals(mut self, intervals: &[Interval]) -> Self {
        self.cfg.intervals = intervals.to_vec();
        self
    }

    /// Restrict the run to these symbols. Symbols absent from a keyspace are ignored.
    #[must_use]
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.symbols = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    /// Number of partitions processed concurrently.
    ///
    /// Each partition is planned once, so workers never touch the same rows.
    /// Higher values shorten the run but multiply the load on the store.
    #[must_use]
    pub const fn concurrency(mut self, n: usize) -> Self {
        self.cfg.concurrency = n;
        self
    }

    /// Compute and report everything without issuing writes.
    #[must_use]
    pub const fn dry_run(mut self, yes: bool) -> Self {
        self.cfg.dry_run = yes;
        self
    }

    /// Condition every write on the row's `updatedAt` still matching what was read.
    ///
    /// A concurrent writer then fails the partition with `Conflict` instead of
    /// being overwritten; re-running picks up its data.
    #[must_use]
    pub const fn guard_writes(mut self, yes: bool) -> Self {
        self.cfg.guard_writes = yes;
        self
    }

    /// Build the `Repairer`.
    ///
    /// Duplicate intervals are dropped, keeping the first occurrence.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no repository was registered, no domain or
    /// interval is configured, two domains share a keyspace or name, or
    /// `concurrency` is zero.
    pub fn build(mut self) -> Result<Repairer, RepairError> {
        let Some(repo) = self.repo else {
            return Err(RepairError::InvalidArg(
                "no repository registered; add one via with_repository(...)".to_string(),
            ));
        };
        if self.cfg.concurrency == 0 {
            return Err(RepairError::InvalidArg(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.cfg.domains.is_empty() {
            return Err(RepairError::InvalidArg("no domains configured".to_string()));
        }
        let mut seen_domains = HashSet::new();
        let mut seen_keyspaces = HashSet::new();
        for d in &self.cfg.domains {
            if !seen_domains.insert(d.domain) || !seen_keyspaces.insert(d.keyspace.as_str()) {
                return Err(RepairError::InvalidArg(format!(
                    "domain {} [{}] configured twice",
                    d.domain, d.keyspace
                )));
            }
        }

        let mut seen = HashSet::new();
        self.cfg.intervals.retain(|i| seen.insert(*i));
        if self.cfg.intervals.is_empty() {
            return Err(RepairError::InvalidArg("no intervals configured".to_string()));
        }

        Ok(Repairer {
            repo,
            cfg: self.cfg,
        })
    }
}

impl Repairer {
    /// Start building a new `Repairer`.
    ///
    /// ```rust,ignore
    /// use candlefix::{Interval, Repairer};
    ///
    /// let repairer = Repairer::builder()
    ///     .with_repository(repo)
    ///     .intervals(&[Interval::H1, Interval::D1])
    ///     .concurrency(4)
    ///     .build()?;
    /// let report = repairer.run(&candlefix::CancelToken::never()).await?;
    /// println!("{report}");
    /// ```
    #[must_use]
    pub fn builder() -> RepairerBuilder {
        RepairerBuilder::new()
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &RepairConfig {
        &self.cfg
    }

    /// Repair every configured domain in order.
    ///
    /// Domains are independent: a missing keyspace or a failed symbol listing
    /// is recorded in that domain's report and the next domain still runs.
    /// Partition failures are recorded and never abort the run.
    ///
    /// # Errors
    /// Returns the error when the store connection itself is unusable
    /// ([`RepairError::is_fatal`]); nothing else aborts a run.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix::run",
            skip(self, cancel),
            fields(
                dry_run = self.cfg.dry_run,
                guard_writes = self.cfg.guard_writes,
                concurrency = self.cfg.concurrency,
            ),
        )
    )]
    pub async fn run(&self, cancel: &CancelToken) -> Result<RepairReport, RepairError> {
        let started_at = Utc::now();
        let mut domains = Vec::with_capacity(self.cfg.domains.len());
        for d in &self.cfg.domains {
            domains.push(self.run_domain(d, started_at, cancel).await?);
        }
        let report = RepairReport {
            dry_run: self.cfg.dry_run,
            started_at,
            finished_at: Utc::now(),
            domains,
        };
        #[cfg(feature = "tracing")]
        {
            let totals = report.totals();
            tracing::info!(
                scanned = totals.scanned,
                duplicates_removed = totals.duplicates_removed,
                open_fixed = totals.open_fixed,
                failed = totals.failed_partitions,
                cancelled = totals.cancelled_partitions,
                "repair finished"
            );
        }
        Ok(report)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix::domain",
            skip(self, d, now, cancel),
            fields(domain = %d.domain, keyspace = %d.keyspace),
        )
    )]
    async fn run_domain(
        &self,
        d: &DomainConfig,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<DomainReport, RepairError> {
        let exists = match self.repo.keyspace_exists(&d.keyspace).await {
            Ok(exists) => exists,
            Err(e) => return domain_failure(d, e),
        };
        if !exists {
            #[cfg(feature = "tracing")]
            tracing::warn!("keyspace does not exist; skipping domain");
            return Ok(DomainReport::skipped(
                d.domain,
                d.keyspace.clone(),
                DomainStatus::MissingKeyspace,
            ));
        }

        let stored = match self.repo.list_symbols(&d.keyspace).await {
            Ok(symbols) => symbols,
            Err(e) => return domain_failure(d, e),
        };
        let units = self.plan_units(stored);
        #[cfg(feature = "tracing")]
        tracing::info!(partitions = units.len(), "processing domain");

        let reports: Vec<PartitionReport> = stream::iter(units)
            .map(|partition| async move {
                let outcome = self
                    .repair_partition(&d.keyspace, &partition, now, cancel)
                    .await;
                PartitionReport {
                    domain: d.domain,
                    partition,
                    outcome,
                }
            })
            .buffer_unordered(self.cfg.concurrency)
            .collect()
            .await;

        Ok(DomainReport::from_partitions(
            d.domain,
            d.keyspace.clone(),
            reports,
        ))
    }

    /// Every `(symbol, interval)` unit of a domain, symbols ascending.
    pub(crate) fn plan_units(&self, mut symbols: Vec<String>) -> Vec<PartitionKey> {
        symbols.sort();
        symbols.dedup();
        if let Some(wanted) = &self.cfg.symbols {
            let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
            symbols.retain(|s| wanted.contains(s.as_str()));
        }
        symbols
            .iter()
            .flat_map(|s| {
                self.cfg
                    .intervals
                    .iter()
                    .map(move |i| PartitionKey::new(s.clone(), *i))
            })
            .collect()
    }

    /// Repair one partition and classify the result.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix::partition",
            skip(self, partition, now, cancel),
            fields(partition = %partition),
        )
    )]
    async fn repair_partition(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> PartitionOutcome {
        if cancel.is_cancelled() {
            return PartitionOutcome::Cancelled;
        }
        // Reads may be abandoned on cancellation; writes always run to completion.
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => return PartitionOutcome::Cancelled,
            rows = self.repo.fetch_candles(keyspace, partition) => rows,
        };
        match self.repair_rows(keyspace, partition, fetched, now).await {
            Ok(outcome) => outcome,
            Err(ApplyError { applied, error }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %error, writes_applied = applied, "partition failed");
                PartitionOutcome::Failed {
                    error,
                    writes_applied: applied,
                }
            }
        }
    }

    async fn repair_rows(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
        fetched: Result<Vec<Candle>, RepairError>,
        now: DateTime<Utc>,
    ) -> Result<PartitionOutcome, ApplyError> {
        let rows = fetched?;
        if rows.is_empty() {
            return Ok(PartitionOutcome::Empty);
        }
        ensure_single_partition(partition, &rows)?;
        let plan = PartitionPlan::build(rows, partition.interval, now, self.cfg.guard_writes);
        if !plan.is_noop() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                updates = plan.updates.len(),
                deletes = plan.deletes.len(),
                dry_run = self.cfg.dry_run,
                "partition needs repair"
            );
            if !self.cfg.dry_run {
                plan.apply(self.repo.as_ref(), keyspace).await?;
            }
        }
        Ok(plan.outcome())
    }
}

/// Record a domain-level failure, or abort the run if the store is unreachable.
fn domain_failure(d: &DomainConfig, error: RepairError) -> Result<DomainReport, RepairError> {
    if error.is_fatal() {
        return Err(error);
    }
    #[cfg(feature = "tracing")]
    tracing::error!(error = %error, "domain failed");
    Ok(DomainReport::skipped(
        d.domain,
        d.keyspace.clone(),
        DomainStatus::Failed { error },
    ))
}
