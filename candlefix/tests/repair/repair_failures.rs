use candlefix::{
    CancelToken, DomainStatus, Interval, MarketDomain, PartitionKey, RepairError,
    RepositoryBuilder, RetryConfig,
};
use candlefix_core::is_well_formed;
use chrono::TimeDelta;
use candlefix_mock::{MockBehavior, Operation, fixtures};
use rust_decimal_macros::dec;

use crate::helpers::{FUTURES, SPOT, builder, late_arrival, store};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        min_backoff_ms: 10,
        max_backoff_ms: 40,
        factor: 2,
        jitter_percent: 0,
    }
}

#[tokio::test]
async fn failing_partition_does_not_stop_the_domain() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.insert(SPOT, late_arrival("ETH/USDT")).await;
    let broken = PartitionKey::new("BTC/USDT", Interval::H1);
    ctl.set_partition_behavior(
        Operation::Fetch,
        broken.clone(),
        MockBehavior::Fail(RepairError::Query("unconfigured table".into())),
    )
    .await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(spot.status, DomainStatus::Completed);
    assert_eq!(spot.stats.partitions, 2);
    assert_eq!(spot.stats.failed_partitions, 1);
    assert_eq!(spot.stats.duplicates_removed, 1);
    assert_eq!(spot.failures.len(), 1);
    assert_eq!(spot.failures[0].partition, broken);
    assert_eq!(
        spot.failures[0].error,
        RepairError::Query("unconfigured table".into())
    );
    assert!(!report.is_clean());

    let eth = ctl
        .rows(SPOT, &PartitionKey::new("ETH/USDT", Interval::H1))
        .await;
    assert_eq!(eth.len(), 6);
}

#[tokio::test]
async fn failed_write_leaves_partition_rerunnable() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.set_behavior(
        Operation::Delete,
        MockBehavior::FailTimes(1, RepairError::Query("write rejected".into())),
    )
    .await;

    let repairer = builder(repo).intervals(&[Interval::H1]).build().unwrap();
    let first = repairer.run(&CancelToken::never()).await.unwrap();
    assert_eq!(first.totals().failed_partitions, 1);
    let spot = first.domain(MarketDomain::Spot).unwrap();
    // both updates landed before the delete was rejected
    assert_eq!(spot.failures[0].writes_applied, 2);
    assert!(first.to_string().contains("after 2 writes"));

    let partition = PartitionKey::new("BTC/USDT", Interval::H1);
    let rows = ctl.rows(SPOT, &partition).await;
    assert_eq!(rows.len(), 7);
    assert_eq!(rows[2].volume, Some(dec!(5)));

    let second = repairer.run(&CancelToken::never()).await.unwrap();
    assert_eq!(second.totals().failed_partitions, 0);
    assert_eq!(second.totals().duplicates_removed, 1);
    assert_eq!(second.totals().open_fixed, 0);
    let rows = ctl.rows(SPOT, &partition).await;
    assert_eq!(rows.len(), 6);
    // the surviving late row is folded into an already merged row: its volume
    // of 4 is counted twice (5 + 4 instead of 5)
    assert_eq!(rows[2].volume, Some(dec!(9)));
    assert_eq!(rows[2].close, dec!(150));
}

#[tokio::test]
async fn stored_close_outside_extremes_is_widened_not_fatal() {
    let (repo, ctl) = store().await;
    let t0 = fixtures::split_hour()[0].created_at;
    let at = |m: i64| t0 + TimeDelta::minutes(m);
    ctl.insert(
        SPOT,
        vec![
            fixtures::candle("BTC/USDT", Interval::H1, at(0), dec!(95), dec!(101), dec!(94), dec!(100), dec!(1)),
            fixtures::candle("BTC/USDT", Interval::H1, at(20), dec!(100), dec!(102), dec!(99), dec!(100), dec!(2)),
            // gapped, and its close already tops its high
            fixtures::candle("BTC/USDT", Interval::H1, at(60), dec!(110), dec!(112), dec!(108), dec!(115), dec!(3)),
        ],
    )
    .await;
    ctl.insert(SPOT, late_arrival("ETH/USDT")).await;

    let report = builder(repo)
        .intervals(&[Interval::H1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert!(spot.failures.is_empty());
    assert_eq!(spot.stats.duplicates_removed, 2);
    assert_eq!(spot.stats.open_fixed, 2);
    assert_eq!(spot.stats.extremes_widened, 1);

    let rows = ctl
        .rows(SPOT, &PartitionKey::new("BTC/USDT", Interval::H1))
        .await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].volume, Some(dec!(3)));
    assert_eq!(rows[1].open, dec!(100));
    assert_eq!(rows[1].high, Some(dec!(115)));
    assert_eq!(rows[1].low, Some(dec!(100)));
    assert_eq!(rows[1].close, dec!(115));
    assert!(rows.iter().all(is_well_formed));
}

#[tokio::test]
async fn symbol_listing_failure_marks_domain_failed() {
    let (repo, ctl) = store().await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    ctl.set_behavior(
        Operation::ListSymbols,
        MockBehavior::FailTimes(1, RepairError::Query("read failure".into())),
    )
    .await;

    let report = builder(repo)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(
        spot.status,
        DomainStatus::Failed {
            error: RepairError::Query("read failure".into())
        }
    );
    assert_eq!(spot.stats.partitions, 0);
    let futures = report.domain(MarketDomain::Futures).unwrap();
    assert_eq!(futures.status, DomainStatus::Completed);
    assert_eq!(futures.stats.open_fixed, 1);
}

#[tokio::test]
async fn lost_connection_aborts_the_run() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, fixtures::split_hour()).await;
    ctl.set_behavior(
        Operation::KeyspaceExists,
        MockBehavior::Fail(RepairError::Connection("no contact point reachable".into())),
    )
    .await;

    let err = builder(repo)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(ctl.calls(Operation::Fetch).await, 0);
    assert!(ctl.mutations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_then_repaired() {
    let (raw, ctl) = store().await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    ctl.set_partition_behavior(
        Operation::Fetch,
        PartitionKey::new("ETH/USDT", Interval::D1),
        MockBehavior::FailTimes(2, RepairError::Unavailable("overloaded".into())),
    )
    .await;
    ctl.set_behavior(
        Operation::Update,
        MockBehavior::FailTimes(1, RepairError::timeout("update_candle")),
    )
    .await;
    let repo = RepositoryBuilder::new(raw).with_retry(fast_retry()).build();

    let report = builder(repo)
        .intervals(&[Interval::D1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.totals().open_fixed, 1);
    assert_eq!(ctl.calls(Operation::Fetch).await, 3);
    assert_eq!(ctl.calls(Operation::Update).await, 2);
    let rows = ctl
        .rows(FUTURES, &PartitionKey::new("ETH/USDT", Interval::D1))
        .await;
    assert_eq!(rows[1].open, dec!(48));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_fail_the_partition() {
    let (raw, ctl) = store().await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    ctl.set_behavior(
        Operation::Fetch,
        MockBehavior::Fail(RepairError::timeout("fetch_candles")),
    )
    .await;
    let repo = RepositoryBuilder::new(raw).with_retry(fast_retry()).build();

    let report = builder(repo)
        .intervals(&[Interval::D1])
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    let futures = report.domain(MarketDomain::Futures).unwrap();
    assert_eq!(futures.failures.len(), 1);
    assert!(matches!(
        futures.failures[0].error,
        RepairError::RetriesExhausted { attempts: 4, .. }
    ));
    assert!(matches!(
        report.domain(MarketDomain::Spot).unwrap().status,
        DomainStatus::Completed
    ));
    assert!(ctl.mutations().await.is_empty());
}
