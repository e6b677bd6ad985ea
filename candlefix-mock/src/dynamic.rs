use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use candlefix_core::{
    Candle, CandleKey, CandleRepository, PartitionKey, RepairError, WriteCondition,
};

/// Repository operation a fault rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `keyspace_exists`
    KeyspaceExists,
    /// `list_symbols`
    ListSymbols,
    /// `fetch_candles`
    Fetch,
    /// `update_candle`
    Update,
    /// `delete_candle`
    Delete,
}

/// Instruction for how a matching call should misbehave.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Fail every matching call with the provided error.
    Fail(RepairError),
    /// Fail the next `n` matching calls, then behave normally.
    FailTimes(u32, RepairError),
    /// Hang indefinitely (simulate a stalled request).
    Hang,
}

struct Rule {
    op: Operation,
    partition: Option<PartitionKey>,
    behavior: MockBehavior,
}

/// A write that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Row overwritten with these values.
    Update {
        /// Target keyspace.
        keyspace: String,
        /// Values written.
        candle: Candle,
    },
    /// Row removed.
    Delete {
        /// Target keyspace.
        keyspace: String,
        /// Removed key.
        key: CandleKey,
    },
}

#[derive(Default)]
struct InternalState {
    keyspaces: HashMap<String, BTreeMap<CandleKey, Candle>>,
    rules: Vec<Rule>,
    mutations: Vec<Mutation>,
    calls: HashMap<Operation, u64>,
}

impl InternalState {
    /// Record the call and pick the first matching fault, consuming one use of
    /// a `FailTimes` rule.
    fn enter(&mut self, op: Operation, partition: Option<&PartitionKey>) -> Option<MockBehavior> {
        *self.calls.entry(op).or_default() += 1;
        let idx = self.rules.iter().position(|r| {
            r.op == op
                && match (&r.partition, partition) {
                    (None, _) => true,
                    (Some(want), Some(got)) => want == got,
                    (Some(_), None) => false,
                }
        })?;
        let (behavior, used_up) = match &mut self.rules[idx].behavior {
            MockBehavior::FailTimes(n, e) => {
                *n = n.saturating_sub(1);
                (MockBehavior::Fail(e.clone()), *n == 0)
            }
            other => (other.clone(), false),
        };
        if used_up {
            self.rules.remove(idx);
        }
        Some(behavior)
    }

    fn check_condition(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        let WriteCondition::UpdatedAtEquals(expected) = condition else {
            return Ok(());
        };
        let current = self
            .keyspaces
            .get(keyspace)
            .and_then(|rows| rows.get(key))
            .map(|c| c.updated_at);
        match current {
            Some(stored) if stored == expected => Ok(()),
            _ => Err(RepairError::conflict(key)),
        }
    }
}

async fn misbehave(behavior: Option<MockBehavior>) -> Result<(), RepairError> {
    match behavior {
        None => Ok(()),
        Some(MockBehavior::Fail(e) | MockBehavior::FailTimes(_, e)) => Err(e),
        Some(MockBehavior::Hang) => {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }
}

/// Controller handle used by tests to seed data, script faults and inspect writes.
#[derive(Clone)]
pub struct MockController {
    state: Arc<Mutex<InternalState>>,
}

impl MockController {
    /// Create an empty keyspace.
    pub async fn create_keyspace(&self, keyspace: &str) {
        let mut guard = self.state.lock().await;
        guard.keyspaces.entry(keyspace.to_string()).or_default();
    }

    /// Store rows, creating the keyspace if needed. Rows with an existing key are replaced.
    pub async fn insert(&self, keyspace: &str, rows: impl IntoIterator<Item = Candle>) {
        let mut guard = self.state.lock().await;
        let table = guard.keyspaces.entry(keyspace.to_string()).or_default();
        for c in rows {
            table.insert(c.key(), c);
        }
    }

    /// Simulate another writer touching a row.
    pub async fn touch(&self, keyspace: &str, key: &CandleKey, updated_at: DateTime<Utc>) {
        let mut guard = self.state.lock().await;
        if let Some(row) = guard
            .keyspaces
            .get_mut(keyspace)
            .and_then(|rows| rows.get_mut(key))
        {
            row.updated_at = Some(updated_at);
        }
    }

    /// Script a fault for every call of `op`.
    pub async fn set_behavior(&self, op: Operation, behavior: MockBehavior) {
        self.push_rule(op, None, behavior).await;
    }

    /// Script a fault for calls of `op` that address `partition`.
    pub async fn set_partition_behavior(
        &self,
        op: Operation,
        partition: PartitionKey,
        behavior: MockBehavior,
    ) {
        self.push_rule(op, Some(partition), behavior).await;
    }

    async fn push_rule(&self, op: Operation, partition: Option<PartitionKey>, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.rules.push(Rule {
            op,
            partition,
            behavior,
        });
    }

    /// Rows currently stored for one partition, ascending by `created_at`.
    pub async fn rows(&self, keyspace: &str, partition: &PartitionKey) -> Vec<Candle> {
        let guard = self.state.lock().await;
        guard
            .keyspaces
            .get(keyspace)
            .map(|rows| {
                rows.values()
                    .filter(|c| c.symbol == partition.symbol && c.interval == partition.interval)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every successful write, in the order it was applied.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.state.lock().await.mutations.clone()
    }

    /// Number of calls made to `op`, including failed ones.
    pub async fn calls(&self, op: Operation) -> u64 {
        self.state
            .lock()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or_default()
    }

    /// Clear all scripted faults, the mutation log and the call counters.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.rules.clear();
        guard.mutations.clear();
        guard.calls.clear();
    }
}

/// A repository that keeps candles in memory and defers faults to a controller.
pub struct InMemoryRepository {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl InMemoryRepository {
    /// Create a new in-memory repository and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<dyn CandleRepository>, MockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = MockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { name, state });
        (me as Arc<dyn CandleRepository>, controller)
    }
}

#[async_trait]
impl CandleRepository for InMemoryRepository {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError> {
        // Acquire behavior snapshot without holding the lock across await points
        let (behavior, exists) = {
            let mut guard = self.state.lock().await;
            let b = guard.enter(Operation::KeyspaceExists, None);
            (b, guard.keyspaces.contains_key(keyspace))
        };
        misbehave(behavior).await?;
        Ok(exists)
    }

    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError> {
        let (behavior, symbols) = {
            let mut guard = self.state.lock().await;
            let b = guard.enter(Operation::ListSymbols, None);
            let symbols: BTreeSet<String> = guard
                .keyspaces
                .get(keyspace)
                .map(|rows| rows.keys().map(|k| k.symbol.clone()).collect())
                .unwrap_or_default();
            (b, symbols)
        };
        misbehave(behavior).await?;
        Ok(symbols.into_iter().collect())
    }

    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError> {
        let (behavior, rows) = {
            let mut guard = self.state.lock().await;
            let b = guard.enter(Operation::Fetch, Some(partition));
            let rows: Vec<Candle> = guard
                .keyspaces
                .get(keyspace)
                .map(|rows| {
                    rows.values()
                        .filter(|c| c.symbol == partition.symbol && c.interval == partition.interval)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            (b, rows)
        };
        misbehave(behavior).await?;
        Ok(rows)
    }

    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.enter(Operation::Update, Some(&candle.partition()))
        };
        misbehave(behavior).await?;

        let mut guard = self.state.lock().await;
        let key = candle.key();
        guard.check_condition(keyspace, &key, condition)?;
        guard
            .keyspaces
            .entry(keyspace.to_string())
            .or_default()
            .insert(key, candle.clone());
        guard.mutations.push(Mutation::Update {
            keyspace: keyspace.to_string(),
            candle: candle.clone(),
        });
        Ok(())
    }

    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        let partition = PartitionKey::new(key.symbol.clone(), key.interval);
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.enter(Operation::Delete, Some(&partition))
        };
        misbehave(behavior).await?;

        let mut guard = self.state.lock().await;
        guard.check_condition(keyspace, key, condition)?;
        if let Some(rows) = guard.keyspaces.get_mut(keyspace) {
            rows.remove(key);
        }
        guard.mutations.push(Mutation::Delete {
            keyspace: keyspace.to_string(),
            key: key.clone(),
        });
        Ok(())
    }
}
