//! candlefix-scylla
//!
//! `CandleRepository` implementation backed by a Scylla / Cassandra cluster
//! through the `scylla` driver. Each market domain is a keyspace holding a
//! `candles` table keyed by `((symbol, interval), "createdAt")`.
#![warn(missing_docs)]

mod builder;
mod codec;
mod config;
mod cql;
mod error;

use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::response::PagingState;
use scylla::statement::unprepared::Statement;
use scylla::value::{CqlValue, Row};
use tokio::sync::RwLock;

use candlefix_core::{
    Candle, CandleKey, CandleRepository, PartitionKey, RepairError, WriteCondition,
};

pub use builder::ScyllaRepositoryBuilder;
pub use codec::{ColumnTypes, PriceType};
pub use config::ScyllaConfig;
pub use cql::validate_identifier;

use crate::codec::{candle_from_row, timestamp_to_value, update_values};
use crate::error::{map_execution_error, map_rows_error, map_session_error, map_typed_rows_error};

/// Candle repository over a shared Scylla session.
///
/// The session pools connections per node, so one instance can serve every
/// concurrent worker.
pub struct ScyllaRepository {
    session: Arc<Session>,
    table: String,
    page_size: i32,
    column_types: RwLock<HashMap<String, ColumnTypes>>,
}

impl ScyllaRepository {
    /// Open a session against the configured contact points.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an empty host list or an invalid table name and
    /// `Connection` if no contact point can be reached.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix_scylla::connect",
            skip(cfg),
            fields(hosts = ?cfg.hosts, datacenter = ?cfg.datacenter),
            err
        )
    )]
    pub async fn connect(cfg: &ScyllaConfig) -> Result<Self, RepairError> {
        if cfg.hosts.is_empty() {
            return Err(RepairError::InvalidArg("no contact points configured".into()));
        }
        validate_identifier("table", &cfg.table)?;
        let mut policy = DefaultPolicy::builder().token_aware(true);
        if let Some(dc) = &cfg.datacenter {
            policy = policy.prefer_datacenter(dc.clone());
        }
        let profile = ExecutionProfile::builder()
            .load_balancing_policy(policy.build())
            .request_timeout(Some(cfg.request_timeout))
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(&cfg.hosts)
            .default_execution_profile_handle(profile.into_handle());
        if let (Some(user), Some(password)) = (&cfg.username, &cfg.password) {
            builder = builder.user(user, password);
        }
        let session = builder.build().await.map_err(|e| map_session_error(&e))?;
        Self::from_session(Arc::new(session), &cfg.table, cfg.page_size)
    }

    /// Wrap an existing session.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `table` is not a plain CQL identifier.
    pub fn from_session(
        session: Arc<Session>,
        table: &str,
        page_size: i32,
    ) -> Result<Self, RepairError> {
        validate_identifier("table", table)?;
        Ok(Self {
            session,
            table: table.to_string(),
            page_size: page_size.max(1),
            column_types: RwLock::new(HashMap::new()),
        })
    }

    /// Run a read, following paging until the result is exhausted.
    async fn select(
        &self,
        operation: &'static str,
        cql: String,
        values: Vec<CqlValue>,
    ) -> Result<Vec<Row>, RepairError> {
        let mut statement = Statement::new(cql);
        statement.set_page_size(self.page_size);
        let mut paging_state = PagingState::start();
        let mut out = Vec::new();
        loop {
            let (result, paging) = self
                .session
                .query_single_page(statement.clone(), &values, paging_state)
                .await
                .map_err(|e| map_execution_error(operation, &e))?;
            let rows = result
                .into_rows_result()
                .map_err(|e| map_rows_error(operation, &e))?;
            for row in rows
                .rows::<Row>()
                .map_err(|e| map_typed_rows_error(operation, &e))?
            {
                out.push(row.map_err(|e| RepairError::Data(format!("{operation}: {e}")))?);
            }
            match paging.into_paging_control_flow() {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(next) => paging_state = next,
            }
        }
        Ok(out)
    }

    /// Run a mutation. Conditional statements must report `[applied] = true`.
    async fn mutate(
        &self,
        operation: &'static str,
        cql: String,
        values: Vec<Option<CqlValue>>,
        condition: WriteCondition,
        key: &CandleKey,
    ) -> Result<(), RepairError> {
        let result = self
            .session
            .query_unpaged(cql, &values)
            .await
            .map_err(|e| map_execution_error(operation, &e))?;
        if condition == WriteCondition::Always {
            return Ok(());
        }
        let rows = result
            .into_rows_result()
            .map_err(|e| map_rows_error(operation, &e))?;
        let applied = rows
            .maybe_first_row::<Row>()
            .map_err(|e| RepairError::Data(format!("{operation}: {e}")))?
            .and_then(|r| r.columns.into_iter().next().flatten());
        match applied {
            Some(CqlValue::Boolean(true)) => Ok(()),
            Some(CqlValue::Boolean(false)) => Err(RepairError::conflict(key)),
            other => Err(RepairError::Query(format!(
                "{operation}: conditional write returned {other:?} instead of [applied]"
            ))),
        }
    }

    /// Declared numeric column types for `keyspace`, cached after the first lookup.
    async fn column_types(&self, keyspace: &str) -> Result<ColumnTypes, RepairError> {
        if let Some(types) = self.column_types.read().await.get(keyspace) {
            return Ok(*types);
        }
        let rows = self
            .select(
                "column_types",
                cql::COLUMN_TYPES.to_string(),
                vec![
                    CqlValue::Text(keyspace.to_string()),
                    CqlValue::Text(self.table.clone()),
                ],
            )
            .await?;
        let pairs = rows.into_iter().filter_map(|r| {
            let mut cols = r.columns.into_iter();
            match (cols.next().flatten(), cols.next().flatten()) {
                (Some(CqlValue::Text(name)), Some(CqlValue::Text(ty))) => Some((name, ty)),
                _ => None,
            }
        });
        let types = ColumnTypes::from_schema(pairs)?;
        self.column_types
            .write()
            .await
            .insert(keyspace.to_string(), types);
        Ok(types)
    }
}

fn condition_value(condition: WriteCondition) -> Option<Option<CqlValue>> {
    match condition {
        WriteCondition::Always => None,
        WriteCondition::UpdatedAtEquals(ts) => Some(ts.map(timestamp_to_value)),
    }
}

#[async_trait]
impl CandleRepository for ScyllaRepository {
    fn name(&self) -> &'static str {
        "scylla"
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError> {
        let rows = self
            .select(
                "keyspace_exists",
                cql::KEYSPACE_EXISTS.to_string(),
                vec![CqlValue::Text(keyspace.to_string())],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "candlefix_scylla::list_symbols", skip(self), err)
    )]
    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError> {
        validate_identifier("keyspace", keyspace)?;
        let rows = self
            .select(
                "list_symbols",
                cql::distinct_partitions(keyspace, &self.table),
                Vec::new(),
            )
            .await?;
        let symbols: BTreeSet<String> = rows
            .into_iter()
            .filter_map(|r| match r.columns.into_iter().next().flatten() {
                Some(CqlValue::Text(s) | CqlValue::Ascii(s)) => Some(s),
                _ => None,
            })
            .collect();
        Ok(symbols.into_iter().collect())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candlefix_scylla::fetch_candles",
            skip(self, partition),
            fields(partition = %partition),
            err
        )
    )]
    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError> {
        validate_identifier("keyspace", keyspace)?;
        let rows = self
            .select(
                "fetch_candles",
                cql::select_partition(keyspace, &self.table),
                vec![
                    CqlValue::Text(partition.symbol.clone()),
                    CqlValue::Text(partition.interval.as_str().to_string()),
                ],
            )
            .await?;
        rows.iter().map(|r| candle_from_row(partition, r)).collect()
    }

    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        validate_identifier("keyspace", keyspace)?;
        let types = self.column_types(keyspace).await?;
        let mut values = update_values(&types, candle)?;
        values.extend(condition_value(condition));
        self.mutate(
            "update_candle",
            cql::update_candle(keyspace, &self.table, condition),
            values,
            condition,
            &candle.key(),
        )
        .await
    }

    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        validate_identifier("keyspace", keyspace)?;
        let mut values = vec![
            Some(CqlValue::Text(key.symbol.clone())),
            Some(CqlValue::Text(key.interval.as_str().to_string())),
            Some(timestamp_to_value(key.created_at)),
        ];
        values.extend(condition_value(condition));
        self.mutate(
            "delete_candle",
            cql::delete_candle(keyspace, &self.table, condition),
            values,
            condition,
            key,
        )
        .await
    }
}
