use candlefix::{CancelToken, Interval, MarketDomain, PartitionKey};
use candlefix_mock::{Operation, fixtures};

use crate::helpers::{FUTURES, SPOT, builder, late_arrival, store};

#[tokio::test]
async fn dry_run_reports_changes_without_writing() {
    let (repo, ctl) = store().await;
    ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
    ctl.insert(SPOT, fixtures::split_hour()).await;
    ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    let before = ctl
        .rows(SPOT, &PartitionKey::new("BTC/USDT", Interval::H1))
        .await;

    let report = builder(repo)
        .dry_run(true)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(ctl.mutations().await.is_empty());
    assert_eq!(ctl.calls(Operation::Update).await, 0);
    assert_eq!(ctl.calls(Operation::Delete).await, 0);
    assert_eq!(
        ctl.rows(SPOT, &PartitionKey::new("BTC/USDT", Interval::H1))
            .await,
        before
    );

    // split_hour and late_arrival share the BTC/USDT@1h partition
    let spot = report.domain(MarketDomain::Spot).unwrap();
    assert_eq!(spot.stats.scanned, 10);
    assert_eq!(spot.stats.duplicates_removed, 3);
    assert_eq!(report.domain(MarketDomain::Futures).unwrap().stats.open_fixed, 1);
    assert!(report.to_string().starts_with("candle repair summary (dry run"));
}

#[tokio::test]
async fn dry_run_matches_a_real_run() {
    let (dry_repo, dry_ctl) = store().await;
    let (real_repo, real_ctl) = store().await;
    for ctl in [&dry_ctl, &real_ctl] {
        ctl.insert(SPOT, late_arrival("BTC/USDT")).await;
        ctl.insert(FUTURES, fixtures::gapped_pair()).await;
    }

    let dry = builder(dry_repo)
        .dry_run(true)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();
    let real = builder(real_repo)
        .build()
        .unwrap()
        .run(&CancelToken::never())
        .await
        .unwrap();

    assert_eq!(dry.totals(), real.totals());
}
