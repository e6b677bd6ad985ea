use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;

use candlefix::{
    CancelToken, Candle, CandleKey, CandleRepository, Interval, MarketDomain, PartitionKey,
    RepairError, WriteCondition,
};
use candlefix_mock::{MockController, fixtures};

use crate::helpers::{SPOT, builder, late_arrival, store};

/// Simulates an ingester that rewrites the newest row right after every read.
struct RacingIngester {
    inner: Arc<dyn CandleRepository>,
    ctl: MockController,
}

#[async_trait]
impl CandleRepository for RacingIngester {
    fn name(&self) -> &'static str {
        "racing"
    }

    async fn keyspace_exists(&self, keyspace: &str) -> Result<bool, RepairError> {
        self.inner.keyspace_exists(keyspace).await
    }

    async fn list_symbols(&self, keyspace: &str) -> Result<Vec<String>, RepairError> {
        self.inner.list_symbols(keyspace).await
    }

    async fn fetch_candles(
        &self,
        keyspace: &str,
        partition: &PartitionKey,
    ) -> Result<Vec<Candle>, RepairError> {
        let rows = self.inner.fetch_candles(keyspace, partition).await?;
        if let Some(newest) = rows.iter().max_by_key(|c| c.created_at) {
            self.ctl
                .touch(keyspace, &newest.key(), fixtures::anchor() + TimeDelta::days(30))
                .await;
        }
        Ok(rows)
    }

    async fn update_candle(
        &self,
        keyspace: &str,
        candle: &Candle,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.inner.update_candle(keyspace, candle, condition).await
    }

    async fn delete_candle(
        &self,
        keyspace: &str,
        key: &CandleKey,
        condition: WriteCondition,
    ) -> Result<(), RepairError> {
        self.inner.delete_candle(keyspace, key, condition).await
    }
}

async fn racing_store() -> (Arc<dyn CandleRepository>, MockController) {
    let (raw, ctl) = store().await;
    let repo = Arc::new(RacingIngester {
        inner: raw,
        ctl: ctl.clone(),
    });
    (repo, ctl)
}

#[tokio::test]
async fn guarded_update_yields_conflict_on_concurrent_write() {
    let (repo, ctl) = racing_store().await;
    // the newest row is the one whose open gets chained
    ctl.insert(SPOT, fixtures::gapped_pair()).await;

    let report = builder(repo)
        .intervals(&[Interval::D1])
        .guard_writes(true)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(spot.failures.len(), 1);
    assert!(matches!(spot.failures[0].error, RepairError::Conflict { .. }));
    assert!(ctl.mutations().await.is_empty());
    let rows = ctl
        .rows(SPOT, &PartitionKey::new("ETH/USDT", Interval::D1))
        .await;
    assert_eq!(rows[1].open, fixtures::gapped_pair()[1].open);
}

#[tokio::test]
async fn guarded_delete_keeps_a_rewritten_duplicate() {
    let (repo, ctl) = racing_store().await;
    // the newest row is the late arrival that gets merged and deleted
    let mut rows = late_arrival("BTC/USDT");
    rows.retain(|c| c.created_at <= rows_cutoff());
    ctl.insert(SPOT, rows).await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .guard_writes(true)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert_eq!(report.totals().failed_partitions, 1);
    let stored = ctl
        .rows(SPOT, &PartitionKey::new("BTC/USDT", Interval::H1))
        .await;
    assert!(stored.iter().any(|c| c.created_at == rows_cutoff()));
}

/// Created-at of the late arrival in `late_arrival`; dropping later rows makes it the newest.
fn rows_cutoff() -> chrono::DateTime<chrono::Utc> {
    fixtures::anchor() + TimeDelta::hours(2) + TimeDelta::minutes(30)
}

#[tokio::test]
async fn unguarded_write_overwrites_concurrent_change() {
    let (repo, ctl) = racing_store().await;
    ctl.insert(SPOT, fixtures::gapped_pair()).await;

    let report = builder(repo)
        .intervals(&[Interval::D1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.totals().open_fixed, 1);
}
